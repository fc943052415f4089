//! Framing of custom messages as Core Lightning exchanges them.
//!
//! Core Lightning hands the `custommsg` hook a hex-string that starts with
//! the 2-byte big-endian message type. `sendcustommsg` expects the same
//! framing.
use anyhow::{anyhow, Context, Result};
use lsp_primitives::lsps0::common_schemas::PublicKey;
use serde::{Deserialize, Serialize};

use crate::transport::CustomMessage;

/// The arguments of the `custommsg` hook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCustomMsgMessage {
    pub peer_id: String,
    pub payload: String,
}

impl RpcCustomMsgMessage {
    pub fn to_custom_message(&self) -> Result<CustomMessage> {
        let peer_id = PublicKey::from_hex(&self.peer_id).context("peer_id is not a valid pubkey")?;
        let payload = hex::decode(&self.payload).context("payload is not valid hex")?;
        let (type_id, payload) = split_type(payload)?;

        Ok(CustomMessage::new(peer_id, type_id, payload))
    }

    pub fn from_custom_message(message: &CustomMessage) -> Result<Self> {
        Ok(Self {
            peer_id: message.peer_id.to_hex(),
            payload: encode_payload(message.type_id, &message.payload)?,
        })
    }
}

/// Prefixes the payload with the message type and hex-encodes the result
pub fn encode_payload(type_id: u32, payload: &[u8]) -> Result<String> {
    let type_id = u16::try_from(type_id)
        .map_err(|_| anyhow!("Message type {} does not fit in 2 bytes", type_id))?;

    let mut framed = Vec::with_capacity(payload.len() + 2);
    framed.extend_from_slice(&type_id.to_be_bytes());
    framed.extend_from_slice(payload);
    Ok(hex::encode(framed))
}

fn split_type(mut framed: Vec<u8>) -> Result<(u32, Vec<u8>)> {
    if framed.len() < 2 {
        return Err(anyhow!(
            "Payload in custommsg should be at least 2 bytes to allow for the message type"
        ));
    }

    let type_id = u16::from_be_bytes([framed[0], framed[1]]);
    let payload = framed.split_off(2);
    Ok((u32::from(type_id), payload))
}
