use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lsp_primitives::lsps0::common_schemas::PublicKey;
use lsp_primitives::secp256k1::{PublicKey as SecpPublicKey, Secp256k1, SecretKey};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::transport::{CustomMessage, LightningNode};

/// A deterministic peer id. `n` must not be zero
pub(crate) fn peer(n: u8) -> PublicKey {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(&[n; 32]).unwrap();
    PublicKey::from(SecpPublicKey::from_secret_key(&secp, &secret_key))
}

/// A node that records what is sent and lets the test inject incoming messages
pub(crate) struct RecordingNode {
    sent: Mutex<Vec<CustomMessage>>,
    send_calls: AtomicUsize,
    fail_sends: AtomicBool,
    hang_sends: AtomicBool,
    sent_tx: mpsc::UnboundedSender<CustomMessage>,
    sent_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<CustomMessage>>,
    incoming_tx: mpsc::Sender<anyhow::Result<CustomMessage>>,
    incoming_rx: Mutex<Option<mpsc::Receiver<anyhow::Result<CustomMessage>>>>,
}

impl RecordingNode {
    pub(crate) fn new() -> Self {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::channel(16);
        Self {
            sent: Mutex::new(Vec::new()),
            send_calls: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
            hang_sends: AtomicBool::new(false),
            sent_tx,
            sent_rx: tokio::sync::Mutex::new(sent_rx),
            incoming_tx,
            incoming_rx: Mutex::new(Some(incoming_rx)),
        }
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Sends never complete, like a peer that stopped reading
    pub(crate) fn hang_sends(&self, hang: bool) {
        self.hang_sends.store(hang, Ordering::SeqCst);
    }

    pub(crate) fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> Vec<CustomMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// The json payload of the last message that was sent
    pub(crate) fn last_sent_json(&self) -> Value {
        let sent = self.sent();
        let message = sent.last().expect("Nothing was sent");
        serde_json::from_slice(&message.payload).unwrap()
    }

    pub(crate) async fn next_sent(&self) -> CustomMessage {
        let mut rx = self.sent_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("Timed out waiting for an outgoing message")
            .expect("Channel closed")
    }

    pub(crate) async fn deliver(&self, message: CustomMessage) {
        self.incoming_tx.send(Ok(message)).await.unwrap();
    }
}

#[async_trait]
impl LightningNode for RecordingNode {
    async fn send_custom_message(
        &self,
        peer_id: &PublicKey,
        type_id: u32,
        payload: &[u8],
    ) -> anyhow::Result<()> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("Peer {} is not connected", peer_id);
        }
        if self.hang_sends.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let message = CustomMessage::new(*peer_id, type_id, payload.to_vec());
        self.sent.lock().unwrap().push(message.clone());
        let _ = self.sent_tx.send(message);
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
