///
/// The arguments of the rpc-commands registered by the plugin.
///
/// Not to be confused with the JSON-RPC messages exchanged with
/// the LSP, which live in `lsp_primitives`.
///
use anyhow::{Context, Result};
use lsp_primitives::lsps0::common_schemas::PublicKey;
use lsp_primitives::lsps1::schema::Lsps1OrderParams;
use serde::Deserialize;

fn default_transport() -> String {
    String::from("http")
}

#[derive(Deserialize, Debug)]
pub struct PeerRequest {
    pub peer_id: String,
}

impl PeerRequest {
    pub fn peer_id(&self) -> Result<PublicKey> {
        parse_peer_id(&self.peer_id)
    }
}

#[derive(Deserialize, Debug)]
pub struct Lsps1CreateOrderRequest {
    pub peer_id: String,
    #[serde(flatten)]
    pub order: Lsps1OrderParams,
    pub refund_onchain_address: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Lsps1GetOrderRequest {
    pub peer_id: String,
    pub order_id: String,
}

#[derive(Deserialize, Debug)]
pub struct Lsps5SetWebhookRequest {
    pub peer_id: String,
    pub app_name: String,
    pub webhook: String,
    #[serde(default = "default_transport")]
    pub transport: String,
}

#[derive(Deserialize, Debug)]
pub struct Lsps5RemoveWebhookRequest {
    pub peer_id: String,
    pub app_name: String,
}

#[derive(Deserialize, Debug)]
pub struct SetProtocolsRequest {
    pub protocols: Vec<u32>,
}

pub fn parse_peer_id(peer_id: &str) -> Result<PublicKey> {
    PublicKey::from_hex(peer_id).with_context(|| format!("Invalid peer_id '{}'", peer_id))
}
