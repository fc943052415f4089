#![allow(dead_code)]
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lsps_hub::lsp_primitives::lsps0::common_schemas::PublicKey;
use lsps_hub::lsp_primitives::secp256k1::{PublicKey as SecpPublicKey, Secp256k1, SecretKey};
use lsps_hub::transport::LSPS_MESSAGE_TYPE;
use lsps_hub::{CustomMessage, HubConfig, LightningNode, LspsHub};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub fn peer(n: u8) -> PublicKey {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(&[n; 32]).unwrap();
    PublicKey::from(SecpPublicKey::from_secret_key(&secp, &secret_key))
}

/// A Lightning node that lives in memory.
///
/// Outgoing messages can be awaited with `next_sent`, incoming ones are
/// injected with `deliver`.
pub struct MemoryNode {
    send_calls: Mutex<usize>,
    sent_tx: mpsc::UnboundedSender<CustomMessage>,
    sent_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<CustomMessage>>,
    incoming_tx: mpsc::Sender<anyhow::Result<CustomMessage>>,
    incoming_rx: Mutex<Option<mpsc::Receiver<anyhow::Result<CustomMessage>>>>,
}

impl MemoryNode {
    pub fn new() -> Self {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::channel(32);
        Self {
            send_calls: Mutex::new(0),
            sent_tx,
            sent_rx: tokio::sync::Mutex::new(sent_rx),
            incoming_tx,
            incoming_rx: Mutex::new(Some(incoming_rx)),
        }
    }

    pub fn send_calls(&self) -> usize {
        *self.send_calls.lock().unwrap()
    }

    pub async fn next_sent(&self) -> CustomMessage {
        let mut rx = self.sent_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("Timed out waiting for an outgoing message")
            .expect("Channel closed")
    }

    /// The next outgoing message decoded as json
    pub async fn next_sent_json(&self) -> (PublicKey, Value) {
        let message = self.next_sent().await;
        assert_eq!(message.type_id, LSPS_MESSAGE_TYPE);
        (message.peer_id, serde_json::from_slice(&message.payload).unwrap())
    }

    pub async fn deliver(&self, message: CustomMessage) {
        self.incoming_tx.send(Ok(message)).await.unwrap();
    }

    pub async fn deliver_json(&self, peer_id: PublicKey, value: Value) {
        let payload = serde_json::to_vec(&value).unwrap();
        self.deliver(CustomMessage::new(peer_id, LSPS_MESSAGE_TYPE, payload))
            .await
    }
}

#[async_trait]
impl LightningNode for MemoryNode {
    async fn send_custom_message(
        &self,
        peer_id: &PublicKey,
        type_id: u32,
        payload: &[u8],
    ) -> anyhow::Result<()> {
        *self.send_calls.lock().unwrap() += 1;
        let _ = self
            .sent_tx
            .send(CustomMessage::new(*peer_id, type_id, payload.to_vec()));
        Ok(())
    }

    async fn subscribe_custom_messages(
        &self,
    ) -> anyhow::Result<mpsc::Receiver<anyhow::Result<CustomMessage>>> {
        self.incoming_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("Already subscribed"))
    }
}

pub struct RunningHub {
    pub node: Arc<MemoryNode>,
    pub hub: Arc<LspsHub>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<lsps_hub::Result<()>>,
}

impl RunningHub {
    pub async fn stop(self) {
        self.cancel.cancel();
        self.task.await.unwrap().unwrap();
        self.hub.shutdown();
    }
}

/// Starts a hub on a fresh node and keeps it dispatching until `stop`
pub fn start_hub(config: HubConfig) -> RunningHub {
    let node = Arc::new(MemoryNode::new());
    let hub = Arc::new(LspsHub::new(node.clone(), config));
    let cancel = CancellationToken::new();

    let task = {
        let hub = hub.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { hub.run(&cancel).await })
    };

    RunningHub {
        node,
        hub,
        cancel,
        task,
    }
}
