use std::sync::RwLock;

use lsp_primitives::json_rpc::{ErrorData, JsonRpcId, JsonRpcRequest, JsonRpcResponse};
use lsp_primitives::lsps0::common_schemas::PublicKey;
use lsp_primitives::lsps0::schema::ListprotocolsResponse;
use lsp_primitives::methods::JsonRpcMethodEnum;
use serde_json::Value;

use crate::error::Result;
use crate::sync::{read, write};
use crate::transport::Transport;

pub const DEFAULT_SUPPORTED_PROTOCOLS: [u32; 3] = [0, 1, 2];

/// Answers LSPS0 requests from peers.
///
/// `lsps0.list_protocols` is the only method this node serves. Anything
/// else is answered with "Method not found".
pub struct Lsps0Service {
    transport: Transport,
    protocols: RwLock<Vec<u32>>,
}

impl Lsps0Service {
    pub fn new(transport: Transport) -> Self {
        Self::with_protocols(transport, DEFAULT_SUPPORTED_PROTOCOLS.to_vec())
    }

    pub fn with_protocols(transport: Transport, protocols: Vec<u32>) -> Self {
        Self {
            transport,
            protocols: RwLock::new(protocols),
        }
    }

    pub fn supported_protocols(&self) -> Vec<u32> {
        read(&self.protocols).clone()
    }

    /// Requests that are being answered keep the list they started with
    pub fn set_supported_protocols(&self, protocols: Vec<u32>) {
        *write(&self.protocols) = protocols;
    }

    pub fn handle_request(&self, request: JsonRpcRequest<Value>) -> JsonRpcResponse<Value, Value> {
        let method = match JsonRpcMethodEnum::from_method_name(&request.method) {
            Ok(JsonRpcMethodEnum::Lsps0ListProtocols(method)) => method,
            _ => {
                return JsonRpcResponse::error(
                    request.id,
                    ErrorData::method_not_found(&request.method),
                )
            }
        };

        let request = match method.into_typed_request(request.clone()) {
            Ok(request) => request,
            Err(error) => return JsonRpcResponse::error(request.id, error),
        };

        let result = ListprotocolsResponse {
            protocols: self.supported_protocols(),
        };

        match serde_json::to_value(result) {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(err) => JsonRpcResponse::error(request.id, ErrorData::internalize(err)),
        }
    }

    /// Answers the request and sends the response to `peer_id`
    pub async fn respond(&self, peer_id: &PublicKey, request: JsonRpcRequest<Value>) -> Result<()> {
        let method = request.method.clone();
        let response = self.handle_request(request);
        if let JsonRpcResponse::Error(failure) = &response {
            log::debug!(
                "Replying to {} from {} with error {}",
                method,
                peer_id,
                failure.error
            );
        } else {
            log::debug!("Replying to {} from {}", method, peer_id);
        }

        self.transport.send_json(peer_id, &response).await
    }

    /// Tells the peer its request couldn't be parsed
    pub async fn respond_parse_error(&self, peer_id: &PublicKey) -> Result<()> {
        let response =
            JsonRpcResponse::<Value, Value>::error(JsonRpcId::empty(), ErrorData::parse_error());
        log::debug!("Replying with a parse error to {}", peer_id);
        self.transport.send_json(peer_id, &response).await
    }
}
