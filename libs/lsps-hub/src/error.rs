use lsp_primitives::json_rpc::error::codes;
use lsp_primitives::json_rpc::{ErrorData, JsonRpcId};
use lsp_primitives::lsps0::common_schemas::PublicKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub type Result<T, E = HubError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Payload of {size} bytes exceeds the limit of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("Transport fault: {0:#}")]
    TransportFault(anyhow::Error),
    #[error("Failed to parse message: {0}")]
    Parse(String),
    #[error("Protocol violation: {0}")]
    Protocol(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("Operation was cancelled")]
    Cancelled,
    #[error("Event queue is closed")]
    Closed,
    #[error("Invalid webhook url: {0}")]
    InvalidWebhookUrl(String),
    #[error("Invalid app name: {0}")]
    InvalidAppName(String),
    #[error("No pending requests for peer {0}")]
    UnknownPeer(PublicKey),
    #[error("Received response for unknown request {0}")]
    UnknownRequest(JsonRpcId),
    #[error("A request with id {0} is already pending")]
    DuplicateRequestId(JsonRpcId),
    #[error("Failed to generate request id: {0}")]
    IdGeneration(String),
}

/// An error returned by the LSP.
///
/// Error data is only kept when the LSP sent a json-object.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("LSP returned error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Describes a response that could not be interpreted
    pub fn parse_error(reason: impl std::fmt::Display) -> Self {
        Self::new(
            codes::PARSE_ERROR_CODE,
            format!("{}: {}", codes::PARSE_ERROR_MSG, reason),
        )
    }

    /// A string from `data` if the LSP provided one
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }
}

impl From<ErrorData<Value>> for RpcError {
    fn from(error: ErrorData<Value>) -> Self {
        let data = match error.data {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };

        Self {
            code: error.code,
            message: error.message,
            data,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_data_is_narrowed_to_objects() {
        let error: ErrorData = serde_json::from_value(json!({
            "code" : 2,
            "message" : "option_mismatch",
            "data" : {"property" : "channel_expiry_blocks"}
        }))
        .unwrap();
        let error = RpcError::from(error);
        assert_eq!(error.data_str("property"), Some("channel_expiry_blocks"));

        let error: ErrorData = serde_json::from_value(json!({
            "code" : 2,
            "message" : "option_mismatch",
            "data" : ["not", "a", "map"]
        }))
        .unwrap();
        let error = RpcError::from(error);
        assert_eq!(error.code, 2);
        assert!(error.data.is_none());
    }

    #[test]
    fn payload_too_large_mentions_sizes() {
        let err = HubError::PayloadTooLarge {
            size: 70_000,
            max: 65_535,
        };
        assert_eq!(
            err.to_string(),
            "Payload of 70000 bytes exceeds the limit of 65535 bytes"
        );
    }
}
