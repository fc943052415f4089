//! Moves LSPS payloads between this node and its peers.
//!
//! The hub never talks to the network itself. Everything goes through a
//! [`LightningNode`] capability which is provided by the host, e.g.: the
//! Core Lightning plugin.
use std::sync::Arc;

use async_trait::async_trait;
use lsp_primitives::lsps0::common_schemas::PublicKey;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{HubError, Result};

/// The custom message type reserved for LSPS0
pub const LSPS_MESSAGE_TYPE: u32 = 51610;

/// Largest payload a custom message can carry
pub const MAX_PAYLOAD_SIZE: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomMessage {
    pub peer_id: PublicKey,
    pub type_id: u32,
    pub payload: Vec<u8>,
}

impl CustomMessage {
    pub fn new(peer_id: PublicKey, type_id: u32, payload: Vec<u8>) -> Self {
        Self {
            peer_id,
            type_id,
            payload,
        }
    }

    pub fn is_lsps(&self) -> bool {
        self.type_id == LSPS_MESSAGE_TYPE
    }
}

/// The capability of the host Lightning node.
#[async_trait]
pub trait LightningNode: Send + Sync {
    async fn send_custom_message(
        &self,
        peer_id: &PublicKey,
        type_id: u32,
        payload: &[u8],
    ) -> anyhow::Result<()>;

    /// Returns all custom messages the node receives from now on.
    ///
    /// Errors on the stream are reported in-line. The stream ends when the
    /// node stops delivering messages.
    async fn subscribe_custom_messages(
        &self,
    ) -> anyhow::Result<mpsc::Receiver<anyhow::Result<CustomMessage>>>;
}

#[derive(Clone)]
pub struct Transport {
    node: Arc<dyn LightningNode>,
}

impl Transport {
    pub fn new(node: Arc<dyn LightningNode>) -> Self {
        Self { node }
    }

    /// Sends a custom message.
    ///
    /// Oversized payloads are refused before the node is contacted.
    pub async fn send(&self, peer_id: &PublicKey, type_id: u32, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(HubError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        self.node
            .send_custom_message(peer_id, type_id, payload)
            .await
            .map_err(HubError::TransportFault)
    }

    /// Serializes `message` and sends it as an LSPS message
    pub async fn send_json<T: Serialize>(&self, peer_id: &PublicKey, message: &T) -> Result<()> {
        let payload =
            serde_json::to_vec(message).map_err(|e| HubError::Protocol(e.to_string()))?;
        self.send(peer_id, LSPS_MESSAGE_TYPE, &payload).await
    }

    pub async fn subscribe(&self, cancel: CancellationToken) -> Result<Subscription> {
        let incoming = self
            .node
            .subscribe_custom_messages()
            .await
            .map_err(HubError::TransportFault)?;
        Ok(Subscription { incoming, cancel })
    }
}

/// Incoming custom messages.
///
/// Ends once the subscription is cancelled or the node stops delivering
/// messages.
pub struct Subscription {
    incoming: mpsc::Receiver<anyhow::Result<CustomMessage>>,
    cancel: CancellationToken,
}

impl Subscription {
    pub async fn next(&mut self) -> Option<Result<CustomMessage>> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.incoming.recv() => {
                item.map(|r| r.map_err(HubError::TransportFault))
            }
        }
    }
}
