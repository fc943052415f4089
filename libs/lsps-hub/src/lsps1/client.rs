use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use lsp_primitives::json_rpc::error::codes;
use lsp_primitives::json_rpc::{generate_random_rpc_id, JsonRpcId, JsonRpcMethod, JsonRpcResponse, NoParams};
use lsp_primitives::lsps0::common_schemas::PublicKey;
use lsp_primitives::lsps1::schema::{
    Lsps1CreateOrderRequest, Lsps1CreateOrderResponse, Lsps1GetOrderRequest, Lsps1Options,
    Lsps1OrderParams,
};
use lsp_primitives::methods;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{HubError, Result, RpcError};
use crate::event_queue::EventQueue;
use crate::events::{Lsps1ClientEvent, Lsps1Order};
use crate::sync::{lock, read, write};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    GetInfo,
    CreateOrder,
    GetOrder,
}

#[derive(Default)]
struct PeerState {
    pending_get_info_requests: HashSet<JsonRpcId>,
    pending_create_order_requests: HashSet<JsonRpcId>,
    pending_get_order_requests: HashSet<JsonRpcId>,
}

impl PeerState {
    fn requests_mut(&mut self, flow: Flow) -> &mut HashSet<JsonRpcId> {
        match flow {
            Flow::GetInfo => &mut self.pending_get_info_requests,
            Flow::CreateOrder => &mut self.pending_create_order_requests,
            Flow::GetOrder => &mut self.pending_get_order_requests,
        }
    }

    /// Removes the request and reports which flow it belonged to
    fn take(&mut self, request_id: &JsonRpcId) -> Option<Flow> {
        [Flow::GetInfo, Flow::CreateOrder, Flow::GetOrder]
            .into_iter()
            .find(|flow| self.requests_mut(*flow).remove(request_id))
    }

    fn contains(&self, request_id: &JsonRpcId) -> bool {
        self.pending_get_info_requests.contains(request_id)
            || self.pending_create_order_requests.contains(request_id)
            || self.pending_get_order_requests.contains(request_id)
    }

    fn len(&self) -> usize {
        self.pending_get_info_requests.len()
            + self.pending_create_order_requests.len()
            + self.pending_get_order_requests.len()
    }

    fn is_empty(&self) -> bool {
        self.pending_get_info_requests.is_empty()
            && self.pending_create_order_requests.is_empty()
            && self.pending_get_order_requests.is_empty()
    }
}

/// Buys channels from an LSP.
///
/// Requests return their id as soon as they are sent. The answer is
/// delivered later as a [`Lsps1ClientEvent`] carrying the same id.
pub struct Lsps1Client {
    transport: Transport,
    pending_events: Arc<EventQueue>,
    per_peer_state: RwLock<HashMap<PublicKey, Mutex<PeerState>>>,
}

/// Forgets a pending request unless the request made it onto the wire
struct PendingGuard<'a> {
    client: &'a Lsps1Client,
    counterparty_node_id: PublicKey,
    flow: Flow,
    request_id: Option<JsonRpcId>,
}

impl PendingGuard<'_> {
    fn disarm(mut self) -> JsonRpcId {
        // `take` leaves `None` behind so `drop` has nothing to undo
        self.request_id.take().unwrap_or_else(JsonRpcId::empty)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(request_id) = self.request_id.take() {
            self.client
                .forget_request(&self.counterparty_node_id, self.flow, &request_id);
        }
    }
}

impl Lsps1Client {
    pub fn new(transport: Transport, pending_events: Arc<EventQueue>) -> Self {
        Self {
            transport,
            pending_events,
            per_peer_state: RwLock::new(HashMap::new()),
        }
    }

    /// Requests the supported options from the LSP.
    ///
    /// The answer arrives as [`Lsps1ClientEvent::SupportedOptionsReady`].
    pub async fn request_supported_options(
        &self,
        counterparty_node_id: &PublicKey,
        cancel: &CancellationToken,
    ) -> Result<JsonRpcId> {
        self.send_request(
            counterparty_node_id,
            Flow::GetInfo,
            methods::LSPS1_GET_INFO,
            NoParams,
            cancel,
        )
        .await
    }

    /// Places an order.
    ///
    /// The answer arrives as [`Lsps1ClientEvent::OrderCreated`].
    pub async fn create_order(
        &self,
        counterparty_node_id: &PublicKey,
        order: Lsps1OrderParams,
        refund_onchain_address: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<JsonRpcId> {
        let params = Lsps1CreateOrderRequest {
            order,
            refund_onchain_address,
        };
        self.send_request(
            counterparty_node_id,
            Flow::CreateOrder,
            methods::LSPS1_CREATE_ORDER,
            params,
            cancel,
        )
        .await
    }

    /// Queries the state of an order.
    ///
    /// The answer arrives as [`Lsps1ClientEvent::OrderStatus`].
    pub async fn check_order_status(
        &self,
        counterparty_node_id: &PublicKey,
        order_id: String,
        cancel: &CancellationToken,
    ) -> Result<JsonRpcId> {
        self.send_request(
            counterparty_node_id,
            Flow::GetOrder,
            methods::LSPS1_GET_ORDER,
            Lsps1GetOrderRequest { order_id },
            cancel,
        )
        .await
    }

    async fn send_request<'a, I, O, E>(
        &self,
        counterparty_node_id: &PublicKey,
        flow: Flow,
        method: JsonRpcMethod<'a, I, O, E>,
        params: I,
        cancel: &CancellationToken,
    ) -> Result<JsonRpcId>
    where
        I: Serialize,
    {
        let request_id =
            generate_random_rpc_id().map_err(|e| HubError::IdGeneration(e.to_string()))?;
        let request = method.create_request(params, request_id.clone());

        {
            let mut outer_state_lock = write(&self.per_peer_state);
            let inner_state_lock = outer_state_lock
                .entry(*counterparty_node_id)
                .or_insert(Mutex::new(PeerState::default()));
            let mut peer_state_lock = lock(inner_state_lock);
            if peer_state_lock.contains(&request_id) {
                return Err(HubError::DuplicateRequestId(request_id));
            }
            peer_state_lock.requests_mut(flow).insert(request_id.clone());
        }

        let guard = PendingGuard {
            client: self,
            counterparty_node_id: *counterparty_node_id,
            flow,
            request_id: Some(request_id),
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HubError::Cancelled),
            sent = self.transport.send_json(counterparty_node_id, &request) => sent?,
        }

        log::debug!(
            "Sent {} with id {} to {}",
            method.name(),
            request.id,
            counterparty_node_id
        );
        Ok(guard.disarm())
    }

    /// Turns a response into an event.
    ///
    /// Fails if the response doesn't belong to a request of this client.
    pub fn handle_response(
        &self,
        counterparty_node_id: &PublicKey,
        response: JsonRpcResponse<Value, Value>,
    ) -> Result<()> {
        let request_id = response.id().clone();
        let flow = self.take_request(counterparty_node_id, &request_id)?;

        let event = match response.into_result() {
            Ok(result) => success_event(flow, *counterparty_node_id, request_id, result),
            Err(error) => failure_event(
                flow,
                *counterparty_node_id,
                request_id,
                describe_error(RpcError::from(error)),
            ),
        };

        self.pending_events.enqueue(event);
        Ok(())
    }

    /// Fails a request because its response couldn't be decoded
    pub fn handle_malformed(
        &self,
        counterparty_node_id: &PublicKey,
        request_id: &JsonRpcId,
        reason: &str,
    ) -> Result<()> {
        let flow = self.take_request(counterparty_node_id, request_id)?;
        self.pending_events.enqueue(failure_event(
            flow,
            *counterparty_node_id,
            request_id.clone(),
            RpcError::parse_error(reason),
        ));
        Ok(())
    }

    pub fn is_pending(&self, counterparty_node_id: &PublicKey, request_id: &JsonRpcId) -> bool {
        let outer_state_lock = read(&self.per_peer_state);
        match outer_state_lock.get(counterparty_node_id) {
            Some(inner_state_lock) => lock(inner_state_lock).contains(request_id),
            None => false,
        }
    }

    /// The number of requests awaiting a response, over all peers
    pub fn pending_requests(&self) -> usize {
        read(&self.per_peer_state)
            .values()
            .map(|inner_state_lock| lock(inner_state_lock).len())
            .sum()
    }

    fn take_request(&self, counterparty_node_id: &PublicKey, request_id: &JsonRpcId) -> Result<Flow> {
        let mut outer_state_lock = write(&self.per_peer_state);

        let (flow, is_empty) = {
            let inner_state_lock = outer_state_lock
                .get(counterparty_node_id)
                .ok_or(HubError::UnknownPeer(*counterparty_node_id))?;
            let mut peer_state_lock = lock(inner_state_lock);
            let flow = peer_state_lock
                .take(request_id)
                .ok_or_else(|| HubError::UnknownRequest(request_id.clone()))?;
            (flow, peer_state_lock.is_empty())
        };

        if is_empty {
            outer_state_lock.remove(counterparty_node_id);
        }
        Ok(flow)
    }

    fn forget_request(&self, counterparty_node_id: &PublicKey, flow: Flow, request_id: &JsonRpcId) {
        let mut outer_state_lock = write(&self.per_peer_state);

        let is_empty = match outer_state_lock.get(counterparty_node_id) {
            Some(inner_state_lock) => {
                let mut peer_state_lock = lock(inner_state_lock);
                peer_state_lock.requests_mut(flow).remove(request_id);
                peer_state_lock.is_empty()
            }
            None => false,
        };

        if is_empty {
            outer_state_lock.remove(counterparty_node_id);
        }
    }
}

fn success_event(
    flow: Flow,
    counterparty_node_id: PublicKey,
    request_id: JsonRpcId,
    result: Value,
) -> Lsps1ClientEvent {
    match flow {
        Flow::GetInfo => match serde_json::from_value::<Lsps1Options>(result) {
            Ok(supported_options) => Lsps1ClientEvent::SupportedOptionsReady {
                request_id,
                counterparty_node_id,
                supported_options,
            },
            Err(e) => failure_event(flow, counterparty_node_id, request_id, RpcError::parse_error(e)),
        },
        Flow::CreateOrder | Flow::GetOrder => {
            let order = match serde_json::from_value::<Lsps1CreateOrderResponse>(result) {
                Ok(response) => Lsps1Order::from(response),
                Err(e) => {
                    return failure_event(
                        flow,
                        counterparty_node_id,
                        request_id,
                        RpcError::parse_error(e),
                    )
                }
            };

            if flow == Flow::CreateOrder {
                Lsps1ClientEvent::OrderCreated {
                    request_id,
                    counterparty_node_id,
                    order,
                }
            } else {
                Lsps1ClientEvent::OrderStatus {
                    request_id,
                    counterparty_node_id,
                    order,
                }
            }
        }
    }
}

fn failure_event(
    flow: Flow,
    counterparty_node_id: PublicKey,
    request_id: JsonRpcId,
    error: RpcError,
) -> Lsps1ClientEvent {
    match flow {
        Flow::GetInfo => Lsps1ClientEvent::SupportedOptionsRequestFailed {
            request_id,
            counterparty_node_id,
            error,
        },
        Flow::CreateOrder => Lsps1ClientEvent::OrderRequestFailed {
            request_id,
            counterparty_node_id,
            error,
        },
        Flow::GetOrder => Lsps1ClientEvent::OrderStatusRequestFailed {
            request_id,
            counterparty_node_id,
            error,
        },
    }
}

/// Adds a human readable explanation to the LSPS1 error codes
fn describe_error(mut error: RpcError) -> RpcError {
    let explanation = match error.code {
        codes::LSPS1_INVALID_PARAMS_CODE => "the LSP rejected the order parameters",
        codes::LSPS1_OPTION_MISMATCH_CODE => "the order doesn't match the options of the LSP",
        _ => return error,
    };

    let message = match error.data_str("property") {
        Some(property) => format!("{} ({} '{}')", error.message, explanation, property),
        None => format!("{} ({})", error.message, explanation),
    };
    error.message = message;
    error
}
