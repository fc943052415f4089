use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use cln_rpc::model::requests::{ListnodesRequest, SendcustommsgRequest};
use cln_rpc::model::{Request, Response};
use cln_rpc::ClnRpc;
use lsp_primitives::lsps0::common_schemas::PublicKey;
use lsp_primitives::lsps0::util::FeatureBitMap;
use lsps_hub::custom_msg::encode_payload;
use lsps_hub::{CustomMessage, LightningNode};
use tokio::sync::mpsc;

pub type IncomingMessages = mpsc::Receiver<anyhow::Result<CustomMessage>>;

/// Talks to Core Lightning over its unix-socket rpc.
///
/// Incoming messages are fed by the `custommsg` hook.
pub struct ClnLightningNode {
    rpc_file: PathBuf,
    incoming: Mutex<Option<IncomingMessages>>,
}

impl ClnLightningNode {
    pub fn new(rpc_file: PathBuf, incoming: IncomingMessages) -> Self {
        Self {
            rpc_file,
            incoming: Mutex::new(Some(incoming)),
        }
    }

    async fn rpc(&self) -> Result<ClnRpc> {
        ClnRpc::new(&self.rpc_file)
            .await
            .with_context(|| format!("Failed to connect to {:?}", self.rpc_file))
    }

    /// All nodes in the gossip that advertise the LSP feature bit
    pub async fn list_lsps(&self) -> Result<Vec<PublicKey>> {
        let mut rpc = self.rpc().await?;
        let response = rpc
            .call(Request::ListNodes(ListnodesRequest { id: None }))
            .await
            .context("listnodes failed")?;

        let nodes = match response {
            Response::ListNodes(list_nodes) => list_nodes.nodes,
            other => return Err(anyhow!("Unexpected response to listnodes: {:?}", other)),
        };

        let mut lsps = Vec::new();
        for node in nodes {
            let features = match node.features.as_deref().map(FeatureBitMap::from_str) {
                Some(Ok(features)) => features,
                _ => continue,
            };
            if features.is_lsp() {
                lsps.push(PublicKey::from_hex(&node.nodeid.to_string())?);
            }
        }
        Ok(lsps)
    }
}

#[async_trait]
impl LightningNode for ClnLightningNode {
    async fn send_custom_message(
        &self,
        peer_id: &PublicKey,
        type_id: u32,
        payload: &[u8],
    ) -> Result<()> {
        let node_id = cln_rpc::primitives::PublicKey::from_slice(&peer_id.serialize())
            .context("Unexpected failure in PublicKey")?;
        let request = Request::SendCustomMsg(SendcustommsgRequest {
            node_id,
            msg: encode_payload(type_id, payload)?,
        });

        let mut rpc = self.rpc().await?;
        let response = rpc
            .call(request)
            .await
            .with_context(|| format!("Failed to send custom message to {}. Are you connected to the peer?", peer_id))?;

        match response {
            Response::SendCustomMsg(status) => {
                log::trace!("sendcustommsg to {}: {}", peer_id, status.status);
                Ok(())
            }
            other => Err(anyhow!("Unexpected response to sendcustommsg: {:?}", other)),
        }
    }

    async fn subscribe_custom_messages(&self) -> Result<IncomingMessages> {
        self.incoming
            .lock()
            .map_err(|_| anyhow!("Custom message subscription is poisoned"))?
            .take()
            .ok_or_else(|| anyhow!("Custom messages can only be subscribed once"))
    }
}
