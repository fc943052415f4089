use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use lsp_primitives::json_rpc::{generate_random_rpc_id, JsonRpcId, JsonRpcMethod, JsonRpcResponse, NoParams};
use lsp_primitives::lsps0::common_schemas::PublicKey;
use lsp_primitives::lsps5::schema::{
    Lsps5ListWebhooksResponse, Lsps5RemoveWebhookRequest, Lsps5SetWebhookRequest,
    Lsps5SetWebhookResponse,
};
use lsp_primitives::lsps5::validation::{validate_app_name, validate_webhook_url};
use lsp_primitives::methods;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{HubError, Result, RpcError};
use crate::event_queue::EventQueue;
use crate::events::Lsps5ClientEvent;
use crate::sync::{lock, read, write};
use crate::transport::Transport;

/// What we need to remember about a request to describe its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingRequest {
    SetWebhook { app_name: String, url: String },
    ListWebhooks,
    RemoveWebhook { app_name: String },
}

#[derive(Default)]
struct PeerState {
    pending_set_webhook_requests: HashMap<JsonRpcId, (String, String)>,
    pending_list_webhooks_requests: HashSet<JsonRpcId>,
    pending_remove_webhook_requests: HashMap<JsonRpcId, String>,
}

impl PeerState {
    fn insert(&mut self, request_id: JsonRpcId, request: PendingRequest) {
        match request {
            PendingRequest::SetWebhook { app_name, url } => {
                self.pending_set_webhook_requests
                    .insert(request_id, (app_name, url));
            }
            PendingRequest::ListWebhooks => {
                self.pending_list_webhooks_requests.insert(request_id);
            }
            PendingRequest::RemoveWebhook { app_name } => {
                self.pending_remove_webhook_requests
                    .insert(request_id, app_name);
            }
        }
    }

    fn take(&mut self, request_id: &JsonRpcId) -> Option<PendingRequest> {
        if let Some((app_name, url)) = self.pending_set_webhook_requests.remove(request_id) {
            return Some(PendingRequest::SetWebhook { app_name, url });
        }
        if self.pending_list_webhooks_requests.remove(request_id) {
            return Some(PendingRequest::ListWebhooks);
        }
        self.pending_remove_webhook_requests
            .remove(request_id)
            .map(|app_name| PendingRequest::RemoveWebhook { app_name })
    }

    fn contains(&self, request_id: &JsonRpcId) -> bool {
        self.pending_set_webhook_requests.contains_key(request_id)
            || self.pending_list_webhooks_requests.contains(request_id)
            || self.pending_remove_webhook_requests.contains_key(request_id)
    }

    fn len(&self) -> usize {
        self.pending_set_webhook_requests.len()
            + self.pending_list_webhooks_requests.len()
            + self.pending_remove_webhook_requests.len()
    }

    fn is_empty(&self) -> bool {
        self.pending_set_webhook_requests.is_empty()
            && self.pending_list_webhooks_requests.is_empty()
            && self.pending_remove_webhook_requests.is_empty()
    }
}

/// Registers webhooks with an LSP so it can wake up this node.
///
/// Like the LSPS1 client, every request yields exactly one
/// [`Lsps5ClientEvent`] carrying the request id.
pub struct Lsps5Client {
    transport: Transport,
    pending_events: Arc<EventQueue>,
    per_peer_state: RwLock<HashMap<PublicKey, Mutex<PeerState>>>,
}

/// Forgets a pending request unless the request made it onto the wire
struct PendingGuard<'a> {
    client: &'a Lsps5Client,
    counterparty_node_id: PublicKey,
    request_id: Option<JsonRpcId>,
}

impl PendingGuard<'_> {
    fn disarm(mut self) -> JsonRpcId {
        self.request_id.take().unwrap_or_else(JsonRpcId::empty)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(request_id) = self.request_id.take() {
            self.client
                .forget_request(&self.counterparty_node_id, &request_id);
        }
    }
}

impl Lsps5Client {
    pub fn new(transport: Transport, pending_events: Arc<EventQueue>) -> Self {
        Self {
            transport,
            pending_events,
            per_peer_state: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `webhook` under `app_name`.
    ///
    /// The app name and url are checked before anything is sent.
    /// `transport` is passed to the LSP as is.
    pub async fn set_webhook(
        &self,
        counterparty_node_id: &PublicKey,
        app_name: String,
        webhook: String,
        transport: String,
        cancel: &CancellationToken,
    ) -> Result<JsonRpcId> {
        validate_app_name(&app_name).map_err(|e| HubError::InvalidAppName(e.to_string()))?;
        validate_webhook_url(&webhook).map_err(|e| HubError::InvalidWebhookUrl(e.to_string()))?;

        let pending = PendingRequest::SetWebhook {
            app_name: app_name.clone(),
            url: webhook.clone(),
        };
        let params = Lsps5SetWebhookRequest {
            app_name,
            webhook,
            transport,
        };
        self.send_request(
            counterparty_node_id,
            pending,
            methods::LSPS5_SET_WEBHOOK,
            params,
            cancel,
        )
        .await
    }

    pub async fn list_webhooks(
        &self,
        counterparty_node_id: &PublicKey,
        cancel: &CancellationToken,
    ) -> Result<JsonRpcId> {
        self.send_request(
            counterparty_node_id,
            PendingRequest::ListWebhooks,
            methods::LSPS5_LIST_WEBHOOKS,
            NoParams,
            cancel,
        )
        .await
    }

    pub async fn remove_webhook(
        &self,
        counterparty_node_id: &PublicKey,
        app_name: String,
        cancel: &CancellationToken,
    ) -> Result<JsonRpcId> {
        validate_app_name(&app_name).map_err(|e| HubError::InvalidAppName(e.to_string()))?;

        let pending = PendingRequest::RemoveWebhook {
            app_name: app_name.clone(),
        };
        self.send_request(
            counterparty_node_id,
            pending,
            methods::LSPS5_REMOVE_WEBHOOK,
            Lsps5RemoveWebhookRequest { app_name },
            cancel,
        )
        .await
    }

    async fn send_request<'a, I, O, E>(
        &self,
        counterparty_node_id: &PublicKey,
        pending: PendingRequest,
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

        self.with_peer_state(counterparty_node_id, |peer_state| {
            if peer_state.contains(&request_id) {
                return Err(HubError::DuplicateRequestId(request_id.clone()));
            }
            peer_state.insert(request_id.clone(), pending);
            Ok(())
        })?;

        let guard = PendingGuard {
            client: self,
            counterparty_node_id: *counterparty_node_id,
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

    fn with_peer_state<F, R>(&self, counterparty_node_id: &PublicKey, f: F) -> R
    where
        F: FnOnce(&mut PeerState) -> R,
    {
        let mut outer_state_lock = write(&self.per_peer_state);
        let inner_state_lock = outer_state_lock
            .entry(*counterparty_node_id)
            .or_insert(Mutex::new(PeerState::default()));
        let mut peer_state_lock = lock(inner_state_lock);
        f(&mut peer_state_lock)
    }

    /// Turns a response into an event.
    ///
    /// A failed `lsps5.list_webhooks` is reported as an event and returned
    /// as an error.
    pub fn handle_response(
        &self,
        counterparty_node_id: &PublicKey,
        response: JsonRpcResponse<Value, Value>,
    ) -> Result<()> {
        let request_id = response.id().clone();
        let pending = self.take_request(counterparty_node_id, &request_id)?;
        let counterparty_node_id = *counterparty_node_id;

        match response.into_result() {
            Ok(result) => {
                let event = success_event(pending, counterparty_node_id, request_id, result);
                self.pending_events.enqueue(event);
                Ok(())
            }
            Err(error) => {
                let error = RpcError::from(error);
                let is_list = pending == PendingRequest::ListWebhooks;
                self.pending_events.enqueue(failure_event(
                    pending,
                    counterparty_node_id,
                    request_id,
                    error.clone(),
                ));
                if is_list {
                    Err(HubError::Rpc(error))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Fails a request because its response couldn't be decoded
    pub fn handle_malformed(
        &self,
        counterparty_node_id: &PublicKey,
        request_id: &JsonRpcId,
        reason: &str,
    ) -> Result<()> {
        let pending = self.take_request(counterparty_node_id, request_id)?;
        self.pending_events.enqueue(failure_event(
            pending,
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

    fn take_request(
        &self,
        counterparty_node_id: &PublicKey,
        request_id: &JsonRpcId,
    ) -> Result<PendingRequest> {
        let mut outer_state_lock = write(&self.per_peer_state);

        let (pending, is_empty) = {
            let inner_state_lock = outer_state_lock
                .get(counterparty_node_id)
                .ok_or(HubError::UnknownPeer(*counterparty_node_id))?;
            let mut peer_state_lock = lock(inner_state_lock);
            let pending = peer_state_lock
                .take(request_id)
                .ok_or_else(|| HubError::UnknownRequest(request_id.clone()))?;
            (pending, peer_state_lock.is_empty())
        };

        if is_empty {
            outer_state_lock.remove(counterparty_node_id);
        }
        Ok(pending)
    }

    fn forget_request(&self, counterparty_node_id: &PublicKey, request_id: &JsonRpcId) {
        // The request may already be gone if a response raced the failure
        let _ = self.take_request(counterparty_node_id, request_id);
    }
}

fn success_event(
    pending: PendingRequest,
    counterparty_node_id: PublicKey,
    request_id: JsonRpcId,
    result: Value,
) -> Lsps5ClientEvent {
    match pending {
        PendingRequest::SetWebhook { app_name, url } => {
            match serde_json::from_value::<Lsps5SetWebhookResponse>(result) {
                Ok(response) => Lsps5ClientEvent::WebhookRegistered {
                    request_id,
                    counterparty_node_id,
                    num_webhooks: response.num_webhooks,
                    max_webhooks: response.max_webhooks,
                    no_change: response.no_change,
                    app_name,
                    url,
                },
                Err(e) => Lsps5ClientEvent::WebhookRegistrationFailed {
                    request_id,
                    counterparty_node_id,
                    error: RpcError::parse_error(e),
                    app_name,
                    url,
                },
            }
        }
        PendingRequest::ListWebhooks => {
            match serde_json::from_value::<Lsps5ListWebhooksResponse>(result) {
                Ok(response) => Lsps5ClientEvent::WebhooksListed {
                    request_id,
                    counterparty_node_id,
                    app_names: response.app_names,
                    max_webhooks: response.max_webhooks,
                },
                Err(e) => Lsps5ClientEvent::WebhooksListFailed {
                    request_id,
                    counterparty_node_id,
                    error: RpcError::parse_error(e),
                },
            }
        }
        // The result is an empty object, nothing to decode
        PendingRequest::RemoveWebhook { app_name } => Lsps5ClientEvent::WebhookRemoved {
            request_id,
            counterparty_node_id,
            app_name,
        },
    }
}

fn failure_event(
    pending: PendingRequest,
    counterparty_node_id: PublicKey,
    request_id: JsonRpcId,
    error: RpcError,
) -> Lsps5ClientEvent {
    match pending {
        PendingRequest::SetWebhook { app_name, url } => Lsps5ClientEvent::WebhookRegistrationFailed {
            request_id,
            counterparty_node_id,
            error,
            app_name,
            url,
        },
        PendingRequest::ListWebhooks => Lsps5ClientEvent::WebhooksListFailed {
            request_id,
            counterparty_node_id,
            error,
        },
        PendingRequest::RemoveWebhook { app_name } => Lsps5ClientEvent::WebhookRemovalFailed {
            request_id,
            counterparty_node_id,
            error,
            app_name,
        },
    }
}
