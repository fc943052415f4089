use std::sync::Arc;

use lsp_primitives::json_rpc::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, MalformedMessage};
use lsp_primitives::lsps0::common_schemas::PublicKey;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{HubError, Result};
use crate::lsps0::{Lsps0Client, Lsps0Service};
use crate::lsps1::Lsps1Client;
use crate::lsps5::Lsps5Client;
use crate::transport::{CustomMessage, Transport};

/// Routes incoming LSPS messages to the handler that expects them.
///
/// Requests are answered by the LSPS0 service. Responses are offered to
/// the LSPS0, LSPS1 and LSPS5 clients in that order.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Transport,
    lsps0_client: Arc<Lsps0Client>,
    lsps0_service: Arc<Lsps0Service>,
    lsps1_client: Arc<Lsps1Client>,
    lsps5_client: Arc<Lsps5Client>,
}

impl Dispatcher {
    pub fn new(
        transport: Transport,
        lsps0_client: Arc<Lsps0Client>,
        lsps0_service: Arc<Lsps0Service>,
        lsps1_client: Arc<Lsps1Client>,
        lsps5_client: Arc<Lsps5Client>,
    ) -> Self {
        Self {
            transport,
            lsps0_client,
            lsps0_service,
            lsps1_client,
            lsps5_client,
        }
    }

    /// Processes incoming messages until `cancel` fires or the node stops
    /// delivering them.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let mut subscription = self.transport.subscribe(cancel.clone()).await?;
        log::info!("Listening for LSPS messages");

        while let Some(message) = subscription.next().await {
            match message {
                Ok(message) => self.handle_message(message),
                Err(err) => log::warn!("Failed to receive custom message: {}", err),
            }
        }

        if cancel.is_cancelled() {
            log::info!("Stopped listening for LSPS messages");
            Ok(())
        } else {
            Err(HubError::TransportFault(anyhow::anyhow!(
                "The node stopped delivering custom messages"
            )))
        }
    }

    /// Routes a single message.
    ///
    /// Replies are sent from a separate task so a slow peer never holds up
    /// the messages behind it.
    pub fn handle_message(&self, message: CustomMessage) {
        if !message.is_lsps() {
            log::trace!(
                "Ignoring custom message of type {} from {}",
                message.type_id,
                message.peer_id
            );
            return;
        }

        let peer_id = message.peer_id;
        match JsonRpcMessage::from_slice(&message.payload) {
            Ok(JsonRpcMessage::Request(request)) => self.handle_request(peer_id, request),
            Ok(JsonRpcMessage::Response(response)) => self.handle_response(&peer_id, response),
            Err(malformed) => self.handle_malformed(peer_id, malformed),
        }
    }

    fn handle_request(&self, peer_id: PublicKey, request: JsonRpcRequest<Value>) {
        let service = self.lsps0_service.clone();
        tokio::spawn(async move {
            if let Err(err) = service.respond(&peer_id, request).await {
                log::warn!("Failed to respond to {}: {}", peer_id, err);
            }
        });
    }

    fn handle_response(&self, peer_id: &PublicKey, response: JsonRpcResponse<Value, Value>) {
        let request_id = response.id().clone();

        if self.lsps0_client.handle_response(peer_id, response.clone()) {
            return;
        }

        match self.lsps1_client.handle_response(peer_id, response.clone()) {
            Ok(()) => return,
            Err(HubError::UnknownPeer(_)) | Err(HubError::UnknownRequest(_)) => {}
            Err(err) => {
                log::warn!("LSPS1 failed to handle response {}: {}", request_id, err);
                return;
            }
        }

        match self.lsps5_client.handle_response(peer_id, response) {
            Ok(()) => {}
            Err(HubError::UnknownPeer(_)) | Err(HubError::UnknownRequest(_)) => {
                log::debug!("Received response with unknown id {} from {}", request_id, peer_id)
            }
            Err(err) => log::warn!("LSPS5 request {} to {} failed: {}", request_id, peer_id, err),
        }
    }

    fn handle_malformed(&self, peer_id: PublicKey, malformed: MalformedMessage) {
        log::debug!("Received malformed message from {}: {}", peer_id, malformed);

        if malformed.is_request {
            let service = self.lsps0_service.clone();
            tokio::spawn(async move {
                if let Err(err) = service.respond_parse_error(&peer_id).await {
                    log::warn!("Failed to send parse error to {}: {}", peer_id, err);
                }
            });
            return;
        }

        let request_id = match &malformed.id {
            Some(id) => id,
            None => return,
        };
        let reason = malformed.reason.as_str();

        let consumed = self.lsps0_client.handle_malformed(&peer_id, request_id, reason)
            || self
                .lsps1_client
                .handle_malformed(&peer_id, request_id, reason)
                .is_ok()
            || self
                .lsps5_client
                .handle_malformed(&peer_id, request_id, reason)
                .is_ok();

        if !consumed {
            log::debug!(
                "Received malformed response with unknown id {} from {}",
                request_id,
                peer_id
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event_queue::EventQueue;
    use crate::test_utils::{peer, RecordingNode};
    use crate::transport::LSPS_MESSAGE_TYPE;
    use serde_json::json;

    struct Setup {
        node: Arc<RecordingNode>,
        events: Arc<EventQueue>,
        lsps0_client: Arc<Lsps0Client>,
        lsps1_client: Arc<Lsps1Client>,
        dispatcher: Dispatcher,
    }

    fn setup() -> Setup {
        let node = Arc::new(RecordingNode::new());
        let transport = Transport::new(node.clone());
        let events = Arc::new(EventQueue::default());
        let lsps0_client = Arc::new(Lsps0Client::new(transport.clone()));
        let lsps0_service = Arc::new(Lsps0Service::new(transport.clone()));
        let lsps1_client = Arc::new(Lsps1Client::new(transport.clone(), events.clone()));
        let lsps5_client = Arc::new(Lsps5Client::new(transport.clone(), events.clone()));
        let dispatcher = Dispatcher::new(
            transport,
            lsps0_client.clone(),
            lsps0_service,
            lsps1_client.clone(),
            lsps5_client,
        );
        Setup {
            node,
            events,
            lsps0_client,
            lsps1_client,
            dispatcher,
        }
    }

    fn lsps_message(peer_id: PublicKey, value: Value) -> CustomMessage {
        CustomMessage::new(peer_id, LSPS_MESSAGE_TYPE, serde_json::to_vec(&value).unwrap())
    }

    #[tokio::test]
    async fn other_message_types_are_ignored() {
        let setup = setup();
        setup.dispatcher.handle_message(CustomMessage::new(
            peer(1),
            51612,
            br#"{"jsonrpc":"2.0","method":"lsps0.list_protocols","id":"r"}"#.to_vec(),
        ));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(setup.node.send_calls(), 0);
    }

    #[tokio::test]
    async fn requests_are_answered() {
        let setup = setup();
        setup.dispatcher.handle_message(lsps_message(
            peer(1),
            json!({"jsonrpc" : "2.0", "method" : "lsps0.unknown", "id" : "r"}),
        ));

        let reply = setup.node.next_sent().await;
        assert_eq!(reply.peer_id, peer(1));
        assert_eq!(reply.type_id, LSPS_MESSAGE_TYPE);
        let reply: Value = serde_json::from_slice(&reply.payload).unwrap();
        assert_eq!(reply["id"], "r");
        assert_eq!(reply["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn unparsable_requests_get_a_parse_error() {
        let setup = setup();
        setup
            .dispatcher
            .handle_message(CustomMessage::new(peer(1), LSPS_MESSAGE_TYPE, b"{not json".to_vec()));

        let reply = setup.node.next_sent().await;
        let reply: Value = serde_json::from_slice(&reply.payload).unwrap();
        assert_eq!(reply["id"], "");
        assert_eq!(reply["error"]["code"], -32700);
        assert_eq!(reply["error"]["message"], "Parse error");
    }

    #[tokio::test]
    async fn responses_reach_the_lsps1_client() {
        let setup = setup();
        let cancel = CancellationToken::new();

        let request_id = setup
            .lsps1_client
            .request_supported_options(&peer(2), &cancel)
            .await
            .unwrap();

        setup.dispatcher.handle_message(lsps_message(
            peer(2),
            json!({"jsonrpc" : "2.0", "id" : request_id.as_str(), "error" : {"code" : -32603, "message" : "Internal error"}}),
        ));

        let event = setup.events.next_event().unwrap();
        assert_eq!(event.event_type(), "lsps1_supported_options_request_failed");
        assert_eq!(event.request_id(), &request_id);
    }

    #[tokio::test]
    async fn malformed_responses_reach_the_lsps0_client() {
        let setup = setup();
        let cancel = CancellationToken::new();

        let task = {
            let client = setup.lsps0_client.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { client.list_protocols(&peer(2), &cancel).await })
        };

        let request = setup.node.next_sent().await;
        let request: Value = serde_json::from_slice(&request.payload).unwrap();

        setup.dispatcher.handle_message(lsps_message(
            peer(2),
            json!({"jsonrpc" : "2.0", "id" : request["id"]}),
        ));

        assert!(matches!(task.await.unwrap(), Err(HubError::Protocol(_))));
    }

    #[tokio::test]
    async fn unknown_responses_are_harmless() {
        let setup = setup();
        setup.dispatcher.handle_message(lsps_message(
            peer(2),
            json!({"jsonrpc" : "2.0", "id" : "ghost", "result" : {}}),
        ));

        assert!(setup.events.is_empty());
        assert_eq!(setup.node.send_calls(), 0);
    }

    #[tokio::test]
    async fn run_ends_on_cancel() {
        let setup = setup();
        let cancel = CancellationToken::new();

        let task = {
            let dispatcher = setup.dispatcher.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { dispatcher.run(&cancel).await })
        };

        setup
            .node
            .deliver(lsps_message(
                peer(3),
                json!({"jsonrpc" : "2.0", "method" : "lsps0.list_protocols", "id" : "abc"}),
            ))
            .await;
        let reply = setup.node.next_sent().await;
        let reply: Value = serde_json::from_slice(&reply.payload).unwrap();
        assert_eq!(reply["result"]["protocols"], json!([0, 1, 2]));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
