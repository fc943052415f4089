use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use cln_plugin::{Error, Plugin};
use lsps_hub::Event;
use serde_json::{json, Value};

use crate::plugin_rpc::{
    parse_peer_id, Lsps1CreateOrderRequest, Lsps1GetOrderRequest, Lsps5RemoveWebhookRequest,
    Lsps5SetWebhookRequest, PeerRequest, SetProtocolsRequest,
};
use crate::state::PluginState;

/// How long a blocking LSPS0 call waits for the LSP
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

fn parse<T: serde::de::DeserializeOwned>(request: Value) -> Result<T> {
    serde_json::from_value(request).context("Failed to parse RPC-request")
}

async fn with_timeout<T, F>(future: F) -> Result<T>
where
    F: Future<Output = lsps_hub::Result<T>>,
{
    tokio::time::timeout(RPC_TIMEOUT, future)
        .await
        .map_err(|_| anyhow!("Time-out, waiting for peer to respond"))?
        .map_err(Error::from)
}

fn request_id_response(request_id: lsp_primitives::json_rpc::JsonRpcId) -> Value {
    json!({ "request_id" : request_id.as_str() })
}

pub async fn list_lsp_servers(plugin: Plugin<PluginState>, _request: Value) -> Result<Value, Error> {
    log::debug!("Listing lsp-servers");
    let servers = plugin.state().node.list_lsps().await?;
    Ok(json!(servers))
}

pub async fn list_protocols(plugin: Plugin<PluginState>, request: Value) -> Result<Value, Error> {
    let request: PeerRequest = parse(request)?;
    let peer_id = request.peer_id()?;
    log::debug!("Listing protocols of {}", peer_id);

    let state = plugin.state();
    let cancel = state.cancel.child_token();
    let protocols =
        with_timeout(state.hub.lsps0_client().list_protocols(&peer_id, &cancel)).await?;
    Ok(json!({ "protocols" : protocols }))
}

pub async fn lsps0_get_info(plugin: Plugin<PluginState>, request: Value) -> Result<Value, Error> {
    let request: PeerRequest = parse(request)?;
    let peer_id = request.peer_id()?;

    let state = plugin.state();
    let cancel = state.cancel.child_token();
    let info = with_timeout(state.hub.lsps0_client().get_info(&peer_id, &cancel)).await?;
    Ok(serde_json::to_value(info)?)
}

pub async fn lsps1_get_info(plugin: Plugin<PluginState>, request: Value) -> Result<Value, Error> {
    let request: PeerRequest = parse(request)?;
    let peer_id = request.peer_id()?;

    let state = plugin.state();
    let request_id = state
        .hub
        .lsps1_client()
        .request_supported_options(&peer_id, &state.cancel)
        .await?;
    Ok(request_id_response(request_id))
}

pub async fn lsps1_create_order(
    plugin: Plugin<PluginState>,
    request: Value,
) -> Result<Value, Error> {
    let request: Lsps1CreateOrderRequest = parse(request)?;
    let peer_id = parse_peer_id(&request.peer_id)?;

    let state = plugin.state();
    let request_id = state
        .hub
        .lsps1_client()
        .create_order(
            &peer_id,
            request.order,
            request.refund_onchain_address,
            &state.cancel,
        )
        .await?;
    Ok(request_id_response(request_id))
}

pub async fn lsps1_get_order(plugin: Plugin<PluginState>, request: Value) -> Result<Value, Error> {
    let request: Lsps1GetOrderRequest = parse(request)?;
    let peer_id = parse_peer_id(&request.peer_id)?;

    let state = plugin.state();
    let request_id = state
        .hub
        .lsps1_client()
        .check_order_status(&peer_id, request.order_id, &state.cancel)
        .await?;
    Ok(request_id_response(request_id))
}

pub async fn lsps5_set_webhook(
    plugin: Plugin<PluginState>,
    request: Value,
) -> Result<Value, Error> {
    let request: Lsps5SetWebhookRequest = parse(request)?;
    let peer_id = parse_peer_id(&request.peer_id)?;

    let state = plugin.state();
    let request_id = state
        .hub
        .lsps5_client()
        .set_webhook(
            &peer_id,
            request.app_name,
            request.webhook,
            request.transport,
            &state.cancel,
        )
        .await?;
    Ok(request_id_response(request_id))
}

pub async fn lsps5_list_webhooks(
    plugin: Plugin<PluginState>,
    request: Value,
) -> Result<Value, Error> {
    let request: PeerRequest = parse(request)?;
    let peer_id = request.peer_id()?;

    let state = plugin.state();
    let request_id = state
        .hub
        .lsps5_client()
        .list_webhooks(&peer_id, &state.cancel)
        .await?;
    Ok(request_id_response(request_id))
}

pub async fn lsps5_remove_webhook(
    plugin: Plugin<PluginState>,
    request: Value,
) -> Result<Value, Error> {
    let request: Lsps5RemoveWebhookRequest = parse(request)?;
    let peer_id = parse_peer_id(&request.peer_id)?;

    let state = plugin.state();
    let request_id = state
        .hub
        .lsps5_client()
        .remove_webhook(&peer_id, request.app_name, &state.cancel)
        .await?;
    Ok(request_id_response(request_id))
}

/// Returns and removes all queued events and push notifications
pub async fn drain_events(plugin: Plugin<PluginState>, _request: Value) -> Result<Value, Error> {
    let state = plugin.state();

    let events = state
        .hub
        .events()
        .drain_pending()
        .iter()
        .map(event_to_json)
        .collect::<Result<Vec<_>>>()?;
    let notifications = state.notifications.drain();

    Ok(json!({
        "events" : events,
        "notifications" : notifications,
    }))
}

pub async fn set_protocols(plugin: Plugin<PluginState>, request: Value) -> Result<Value, Error> {
    let request: SetProtocolsRequest = parse(request)?;
    let service = plugin.state().hub.lsps0_service();
    service.set_supported_protocols(request.protocols);
    log::info!("Advertising protocols {:?}", service.supported_protocols());
    Ok(json!({ "protocols" : service.supported_protocols() }))
}

fn event_to_json(event: &Event) -> Result<Value> {
    let mut value = serde_json::to_value(event)?;
    match value.as_object_mut() {
        Some(map) => {
            map.insert("event_type".to_string(), json!(event.event_type()));
            Ok(value)
        }
        None => Err(anyhow!("Event {} is not a json object", event.event_type())),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use lsp_primitives::json_rpc::JsonRpcId;
    use lsp_primitives::lsps0::common_schemas::PublicKey;
    use lsps_hub::events::Lsps5ClientEvent;
    use lsps_hub::RpcError;

    #[test]
    fn events_carry_their_type() {
        let peer_id = PublicKey::from_hex(
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        )
        .unwrap();
        let event = Event::from(Lsps5ClientEvent::WebhooksListFailed {
            request_id: JsonRpcId::from("abc"),
            counterparty_node_id: peer_id,
            error: RpcError::new(-32603, "Internal error"),
        });

        let value = event_to_json(&event).unwrap();
        assert_eq!(value["event_type"], "lsps5_webhooks_list_failed");
        assert_eq!(value["request_id"], "abc");
        assert_eq!(value["error"]["code"], -32603);
    }
}
