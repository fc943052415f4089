use crate::json_rpc::{JsonRpcId, JsonRpcResponseFailure};
use serde::{Deserialize, Serialize};

pub mod codes {
    pub const PARSE_ERROR_CODE: i64 = -32700;
    pub const PARSE_ERROR_MSG: &str = "Parse error";

    pub const INVALID_REQUEST_CODE: i64 = -32600;
    pub const INVALID_REQUEST_MSG: &str = "Invalid Request";

    pub const METHOD_NOT_FOUND_CODE: i64 = -32601;
    pub const METHOD_NOT_FOUND_MSG: &str = "Method not found";

    pub const INVALID_PARAMS_CODE: i64 = -32602;
    pub const INVALID_PARAMS_MSG: &str = "Invalid params";

    pub const INTERNAL_ERROR_CODE: i64 = -32603;
    pub const INTERNAL_ERROR_MSG: &str = "Internal error";

    // LSPS1
    pub const LSPS1_INVALID_PARAMS_CODE: i64 = 1;
    pub const LSPS1_OPTION_MISMATCH_CODE: i64 = 2;

    // LSPS5
    pub const LSPS5_TOO_LONG_CODE: i64 = 500;
    pub const LSPS5_URL_PARSE_CODE: i64 = 501;
    pub const LSPS5_UNSUPPORTED_PROTOCOL_CODE: i64 = 502;
    pub const LSPS5_TOO_MANY_WEBHOOKS_CODE: i64 = 503;
    pub const LSPS5_APP_NAME_NOT_FOUND_CODE: i64 = 1010;
}

/// Maps a code to a short human readable label.
///
/// Codes that are not defined by JSON-RPC 2.0 are reported
/// as `unknown_error_code`. Protocol specific codes should be
/// interpreted by the protocol handler.
pub fn map_json_rpc_error_code_to_str(code: i64) -> &'static str {
    match code {
        -32700 => "parsing_error",
        -32600 => "invalid_request",
        -32601 => "method_not_found",
        -32602 => "invalid_params",
        -32603 => "internal_error",
        -32099..=-32000 => "implementation_defined_server_error",
        _ => "unknown_error_code",
    }
}

pub type DefaultError = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData<E = DefaultError> {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<E>,
}

impl<E> ErrorData<E> {
    pub fn into_response(self, id: JsonRpcId) -> JsonRpcResponseFailure<E> {
        JsonRpcResponseFailure {
            id,
            jsonrpc: String::from("2.0"),
            error: self,
        }
    }

    pub fn invalid_params(data: E) -> Self {
        Self {
            code: codes::INVALID_PARAMS_CODE,
            message: codes::INVALID_PARAMS_MSG.into(),
            data: Some(data),
        }
    }

    pub fn internal_error(data: E) -> Self {
        Self {
            code: codes::INTERNAL_ERROR_CODE,
            message: codes::INTERNAL_ERROR_MSG.into(),
            data: Some(data),
        }
    }
}

impl ErrorData<DefaultError> {
    pub fn parse_error() -> Self {
        Self {
            code: codes::PARSE_ERROR_CODE,
            message: String::from(codes::PARSE_ERROR_MSG),
            data: None,
        }
    }

    pub fn invalid_request() -> Self {
        Self {
            code: codes::INVALID_REQUEST_CODE,
            message: codes::INVALID_REQUEST_MSG.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: codes::METHOD_NOT_FOUND_CODE,
            message: codes::METHOD_NOT_FOUND_MSG.into(),
            data: Some(serde_json::json!({ "method": method })),
        }
    }

    pub fn internalize<T: core::fmt::Debug>(err: T) -> Self {
        Self::internal_error(serde_json::Value::String(format!("{:?}", err)))
    }
}

impl std::fmt::Display for ErrorData<DefaultError> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.code, self.message)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_map_json_rpc_error_code_to_str() {
        assert_eq!(map_json_rpc_error_code_to_str(12), "unknown_error_code");
        assert_eq!(map_json_rpc_error_code_to_str(-32603), "internal_error");
        assert_eq!(map_json_rpc_error_code_to_str(-32050), "implementation_defined_server_error");
    }

    #[test]
    fn error_data_without_data_omits_the_field() {
        let value = serde_json::to_value(ErrorData::parse_error()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"code" : -32700, "message" : "Parse error"})
        );
    }

    #[test]
    fn failure_without_data_decodes_for_typed_errors() {
        #[allow(dead_code)]
        #[derive(Debug, PartialEq, Deserialize)]
        struct NotDefault {
            property: String,
        }

        let json_str = r#"{"id":"abc","jsonrpc":"2.0","error":{"code":1,"message":"m"}}"#;
        let failure: JsonRpcResponseFailure<NotDefault> = serde_json::from_str(json_str).unwrap();
        assert_eq!(failure.error.code, 1);
        assert_eq!(failure.error.data, None);
    }

    #[test]
    fn method_not_found_echoes_method() {
        let error = ErrorData::method_not_found("lsps0.unknown");
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
        assert_eq!(error.data.unwrap()["method"], "lsps0.unknown");
    }
}
