use lsp_primitives::json_rpc::{
    generate_random_rpc_id, JsonRpcId, JsonRpcMethod, JsonRpcResponse, NoParams,
};
use lsp_primitives::lsps0::common_schemas::PublicKey;
use lsp_primitives::lsps0::schema::Lsps0GetInfoResponse;
use lsp_primitives::methods;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{HubError, Result, RpcError};
use crate::pending::ResponseSlots;
use crate::transport::Transport;

/// What the dispatcher hands to a waiting request. `Err` carries the
/// reason a response with a matching id could not be decoded.
type Reply = std::result::Result<JsonRpcResponse<Value, Value>, String>;

#[derive(Hash, PartialEq, Eq, Debug, Clone)]
pub struct RequestId {
    peer_id: PublicKey,
    msg_id: JsonRpcId,
}

impl RequestId {
    pub fn new(peer_id: PublicKey, msg_id: JsonRpcId) -> Self {
        Self { peer_id, msg_id }
    }
}

/// Sends LSPS0 requests and waits for the answer.
///
/// Every request owns a slot in the in-flight table until it returns,
/// whatever the outcome.
pub struct Lsps0Client {
    transport: Transport,
    pending: ResponseSlots<RequestId, Reply>,
}

impl Lsps0Client {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            pending: ResponseSlots::new(),
        }
    }

    pub async fn list_protocols(
        &self,
        peer_id: &PublicKey,
        cancel: &CancellationToken,
    ) -> Result<Vec<u32>> {
        let response = self
            .request(peer_id, methods::LSPS0_LIST_PROTOCOLS, NoParams, cancel)
            .await?;
        Ok(response.protocols)
    }

    pub async fn get_info(
        &self,
        peer_id: &PublicKey,
        cancel: &CancellationToken,
    ) -> Result<Lsps0GetInfoResponse> {
        self.request(peer_id, methods::LSPS0_GET_INFO, NoParams, cancel)
            .await
    }

    /// Sends a request with a fresh id
    pub async fn request<'a, I, O, E>(
        &self,
        peer_id: &PublicKey,
        method: JsonRpcMethod<'a, I, O, E>,
        params: I,
        cancel: &CancellationToken,
    ) -> Result<O>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        let rpc_id = generate_random_rpc_id().map_err(|e| HubError::IdGeneration(e.to_string()))?;
        self.request_with_id(peer_id, method, params, rpc_id, cancel)
            .await
    }

    /// Sends a request using the provided id.
    ///
    /// Prefer [`Lsps0Client::request`], LSPS0 requires ids with at least
    /// 80 bits of entropy.
    pub async fn request_with_id<'a, I, O, E>(
        &self,
        peer_id: &PublicKey,
        method: JsonRpcMethod<'a, I, O, E>,
        params: I,
        rpc_id: JsonRpcId,
        cancel: &CancellationToken,
    ) -> Result<O>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        let request = method.create_request(params, rpc_id.clone());
        let slot = self
            .pending
            .register(RequestId::new(*peer_id, rpc_id))
            .map_err(|key| HubError::DuplicateRequestId(key.msg_id))?;

        // Dropping `slot` on any early return frees the entry
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HubError::Cancelled),
            sent = self.transport.send_json(peer_id, &request) => sent?,
        }

        log::debug!(
            "Sent {} with id {} to {}",
            method.name(),
            request.id,
            peer_id
        );

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HubError::Cancelled),
            reply = slot => reply,
        };

        match reply {
            None => Err(HubError::Protocol(
                "Stopped waiting for a response".to_string(),
            )),
            Some(Err(reason)) => Err(HubError::Protocol(reason)),
            Some(Ok(response)) => match response.into_result() {
                Ok(result) => serde_json::from_value(result).map_err(|e| {
                    HubError::Protocol(format!(
                        "Unexpected result for {}: {}",
                        method.name(),
                        e
                    ))
                }),
                Err(error) => Err(HubError::Rpc(RpcError::from(error))),
            },
        }
    }

    /// Returns `true` if the response was awaited by this client
    pub fn handle_response(&self, peer_id: &PublicKey, response: JsonRpcResponse<Value, Value>) -> bool {
        let key = RequestId::new(*peer_id, response.id().clone());
        self.pending.complete(&key, Ok(response))
    }

    /// Fails the request with `rpc_id` because its response couldn't be decoded
    pub fn handle_malformed(&self, peer_id: &PublicKey, rpc_id: &JsonRpcId, reason: &str) -> bool {
        let key = RequestId::new(*peer_id, rpc_id.clone());
        self.pending.complete(&key, Err(reason.to_string()))
    }

    pub fn is_pending(&self, peer_id: &PublicKey, rpc_id: &JsonRpcId) -> bool {
        self.pending
            .contains(&RequestId::new(*peer_id, rpc_id.clone()))
    }

    /// The number of requests awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }
}
