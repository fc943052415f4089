use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::json_rpc::NoParams;
use crate::lsps0::parameter_validation::ExpectedFields;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lsps5SetWebhookRequest {
    pub app_name: String,
    pub webhook: String,
    /// Passed verbatim to the LSP
    pub transport: String,
}

impl ExpectedFields for Lsps5SetWebhookRequest {
    fn expected_fields() -> Vec<String> {
        vec![
            "app_name".to_string(),
            "webhook".to_string(),
            "transport".to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lsps5SetWebhookResponse {
    pub num_webhooks: u32,
    pub max_webhooks: u32,
    pub no_change: bool,
}

pub type Lsps5ListWebhooksRequest = NoParams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lsps5ListWebhooksResponse {
    pub app_names: Vec<String>,
    pub max_webhooks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lsps5RemoveWebhookRequest {
    pub app_name: String,
}

impl ExpectedFields for Lsps5RemoveWebhookRequest {
    fn expected_fields() -> Vec<String> {
        vec!["app_name".to_string()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Lsps5RemoveWebhookResponse {}

pub const PAYMENT_INCOMING: &str = "lsps5.payment_incoming";
pub const EXPIRY_SOON: &str = "lsps5.expiry_soon";
pub const LIQUIDITY_MANAGEMENT_REQUEST: &str = "lsps5.liquidity_management_request";
pub const ONION_MESSAGE_INCOMING: &str = "lsps5.onion_message_incoming";
pub const ORDER_STATE_CHANGED: &str = "lsps5.order_state_changed";

/// A notification as it is delivered by the LSP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lsps5NotificationPayload {
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// The notifications an LSP can push to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lsps5Notification {
    PaymentIncoming,
    ExpirySoon {
        timeout: u64,
    },
    LiquidityManagementRequest,
    OnionMessageIncoming,
    OrderStateChanged {
        order_id: String,
        state: String,
        channel_point: Option<String>,
        error: Option<String>,
    },
}

impl Lsps5Notification {
    pub fn method(&self) -> &'static str {
        match self {
            Self::PaymentIncoming => PAYMENT_INCOMING,
            Self::ExpirySoon { .. } => EXPIRY_SOON,
            Self::LiquidityManagementRequest => LIQUIDITY_MANAGEMENT_REQUEST,
            Self::OnionMessageIncoming => ONION_MESSAGE_INCOMING,
            Self::OrderStateChanged { .. } => ORDER_STATE_CHANGED,
        }
    }

    /// Interprets a payload.
    ///
    /// Method names are accepted with or without the `lsps5.` prefix.
    pub fn from_payload(payload: &Lsps5NotificationPayload) -> Result<Self> {
        let method = payload.method.as_str();
        let method = method.strip_prefix("lsps5.").unwrap_or(method);
        let params = &payload.params;

        match method {
            "payment_incoming" => Ok(Self::PaymentIncoming),
            "expiry_soon" => {
                let timeout = params
                    .get("timeout")
                    .and_then(value_as_u64)
                    .context("expiry_soon requires a numeric 'timeout'")?;
                Ok(Self::ExpirySoon { timeout })
            }
            "liquidity_management_request" => Ok(Self::LiquidityManagementRequest),
            "onion_message_incoming" => Ok(Self::OnionMessageIncoming),
            "order_state_changed" => Ok(Self::OrderStateChanged {
                order_id: required_str(params, "order_id")?,
                state: required_str(params, "state")?,
                channel_point: optional_str(params, "channel_point"),
                error: optional_str(params, "error"),
            }),
            other => Err(anyhow!("Unknown LSPS5 notification '{}'", other)),
        }
    }
}

// Some LSPs encode numbers as strings
fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn required_str(params: &Map<String, Value>, name: &str) -> Result<String> {
    optional_str(params, name).with_context(|| format!("Missing string parameter '{}'", name))
}

fn optional_str(params: &Map<String, Value>, name: &str) -> Option<String> {
    params.get(name).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Lsps5NotificationPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parse_notifications() {
        let n = payload(json!({"method" : "lsps5.payment_incoming", "params" : {}}));
        assert_eq!(Lsps5Notification::from_payload(&n).unwrap(), Lsps5Notification::PaymentIncoming);

        let n = payload(json!({"method" : "expiry_soon", "params" : {"timeout" : 840_000}}));
        assert_eq!(
            Lsps5Notification::from_payload(&n).unwrap(),
            Lsps5Notification::ExpirySoon { timeout: 840_000 }
        );

        let n = payload(json!({
            "method" : "lsps5.order_state_changed",
            "params" : {"order_id" : "o1", "state" : "COMPLETED", "channel_point" : "ab:0"}
        }));
        assert_eq!(
            Lsps5Notification::from_payload(&n).unwrap(),
            Lsps5Notification::OrderStateChanged {
                order_id: "o1".to_string(),
                state: "COMPLETED".to_string(),
                channel_point: Some("ab:0".to_string()),
                error: None,
            }
        );
    }

    #[test]
    fn params_may_be_omitted() {
        let n = payload(json!({"method" : "lsps5.onion_message_incoming"}));
        assert!(n.params.is_empty());
        assert_eq!(
            Lsps5Notification::from_payload(&n).unwrap().method(),
            ONION_MESSAGE_INCOMING
        );
    }

    #[test]
    fn reject_incomplete_notifications() {
        let cases = vec![
            json!({"method" : "lsps5.expiry_soon", "params" : {}}),
            json!({"method" : "lsps5.order_state_changed", "params" : {"order_id" : "o1"}}),
            json!({"method" : "lsps5.unknown", "params" : {}}),
        ];

        for case in cases {
            assert!(Lsps5Notification::from_payload(&payload(case)).is_err());
        }
    }

    #[test]
    fn remove_webhook_response_is_an_empty_object() {
        let response: Lsps5RemoveWebhookResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(serde_json::to_value(response).unwrap(), json!({}));
    }
}
