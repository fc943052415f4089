use crate::json_rpc::NoParams;
use crate::lsps0::common_schemas::{IsoDatetime, LokiAmount};
use crate::lsps0::parameter_validation::ExpectedFields;
use serde::{Deserialize, Serialize};

pub type Lsps1GetInfoRequest = NoParams;

/// Options returned when calling `lsps1.get_info`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lsps1Options {
    pub min_required_channel_confirmations: u16,
    pub min_funding_confirms_within_blocks: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_onchain_payment_confirmations: Option<u16>,
    pub supports_zero_channel_reserve: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_onchain_payment_size_loki: Option<LokiAmount>,
    pub max_channel_expiry_blocks: u32,
    pub min_initial_client_balance_loki: LokiAmount,
    pub max_initial_client_balance_loki: LokiAmount,
    pub min_initial_lsp_balance_loki: LokiAmount,
    pub max_initial_lsp_balance_loki: LokiAmount,
    pub min_channel_balance_loki: LokiAmount,
    pub max_channel_balance_loki: LokiAmount,
}

pub type Lsps1GetInfoResponse = Lsps1Options;

/// The channel a client wants to buy.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lsps1OrderParams {
    pub lsp_balance_loki: LokiAmount,
    pub client_balance_loki: LokiAmount,
    pub required_channel_confirmations: u16,
    pub funding_confirms_within_blocks: u16,
    pub channel_expiry_blocks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub announce_channel: bool,
}

const ORDER_PARAMS_FIELDS: [&str; 7] = [
    "lsp_balance_loki",
    "client_balance_loki",
    "required_channel_confirmations",
    "funding_confirms_within_blocks",
    "channel_expiry_blocks",
    "token",
    "announce_channel",
];

impl ExpectedFields for Lsps1OrderParams {
    fn expected_fields() -> Vec<String> {
        ORDER_PARAMS_FIELDS.iter().map(|f| f.to_string()).collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lsps1CreateOrderRequest {
    #[serde(flatten)]
    pub order: Lsps1OrderParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_onchain_address: Option<String>,
}

impl ExpectedFields for Lsps1CreateOrderRequest {
    fn expected_fields() -> Vec<String> {
        let mut fields = Lsps1OrderParams::expected_fields();
        fields.push("refund_onchain_address".to_string());
        fields
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lsps1CreateOrderResponse {
    pub order_id: String,
    pub order: Lsps1OrderParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<IsoDatetime>,
    /// The state as advertised by the LSP, e.g. `CREATED`, `COMPLETED` or `FAILED`
    pub order_state: String,
    pub payment: Lsps1PaymentInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Lsps1ChannelInfo>,
}

/// The ways the LSP accepts payment for an order.
///
/// Every field is optional. A client picks any of the advertised methods.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Lsps1PaymentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bolt11: Option<Lsps1Bolt11PaymentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bolt12: Option<Lsps1Bolt12PaymentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onchain: Option<Lsps1OnchainPaymentInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lsps1Bolt11PaymentInfo {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<IsoDatetime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_total_loki: Option<LokiAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_total_loki: Option<LokiAmount>,
    pub invoice: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lsps1Bolt12PaymentInfo {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<IsoDatetime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_total_loki: Option<LokiAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_total_loki: Option<LokiAmount>,
    pub offer: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lsps1OnchainPaymentInfo {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<IsoDatetime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_total_loki: Option<LokiAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_total_loki: Option<LokiAmount>,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_onchain_payment_confirmations: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_fee_for_0conf: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_onchain_address: Option<String>,
}

/// Present once the channel has been funded
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lsps1ChannelInfo {
    pub funded_at: IsoDatetime,
    pub funding_outpoint: String,
    pub expires_at: IsoDatetime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lsps1GetOrderRequest {
    pub order_id: String,
}

impl ExpectedFields for Lsps1GetOrderRequest {
    fn expected_fields() -> Vec<String> {
        vec!["order_id".to_string()]
    }
}

pub type Lsps1GetOrderResponse = Lsps1CreateOrderResponse;
