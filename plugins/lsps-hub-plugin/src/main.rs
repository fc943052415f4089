mod node;
mod options;
mod plugin_rpc;
mod relay;
mod rpc_methods;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use cln_plugin::{Builder, Plugin};
use lsps_hub::custom_msg::RpcCustomMsgMessage;
use lsps_hub::LspsHub;
use serde_json::json;
use tokio::sync::mpsc;

use crate::node::ClnLightningNode;
use crate::options::PluginOptions;
use crate::relay::NostrSdkPool;
use crate::state::PluginState;

/// Messages waiting for the dispatcher
const INCOMING_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    log::info!("Configure plugin 'lsps-hub'");
    let configured_plugin =
        match Builder::<PluginState, _, _>::new(tokio::io::stdin(), tokio::io::stdout())
            .option(options::supported_protocols())
            .option(options::event_queue_capacity())
            .option(options::nostr_relays())
            .option(options::nostr_trusted_pubkeys())
            .option(options::nostr_pubkey())
            .rpcmethod(
                "lsps0-list-servers",
                "List all lsps-servers that have publicly announced themselves",
                rpc_methods::list_lsp_servers,
            )
            .rpcmethod(
                "lsps0-list-protocols",
                "List all protocols supported by an LSP-server",
                rpc_methods::list_protocols,
            )
            .rpcmethod(
                "lsps0-get-info",
                "Get the LSPS0 info of an LSP-server",
                rpc_methods::lsps0_get_info,
            )
            .rpcmethod(
                "lsps1-get-info",
                "Request the channel options of an LSP. The answer is an event",
                rpc_methods::lsps1_get_info,
            )
            .rpcmethod(
                "lsps1-create-order",
                "Order a channel from an LSP. The answer is an event",
                rpc_methods::lsps1_create_order,
            )
            .rpcmethod(
                "lsps1-get-order",
                "Request the state of an order. The answer is an event",
                rpc_methods::lsps1_get_order,
            )
            .rpcmethod(
                "lsps5-set-webhook",
                "Register a webhook at an LSP. The answer is an event",
                rpc_methods::lsps5_set_webhook,
            )
            .rpcmethod(
                "lsps5-list-webhooks",
                "List the webhooks registered at an LSP. The answer is an event",
                rpc_methods::lsps5_list_webhooks,
            )
            .rpcmethod(
                "lsps5-remove-webhook",
                "Remove a webhook from an LSP. The answer is an event",
                rpc_methods::lsps5_remove_webhook,
            )
            .rpcmethod(
                "lsps-hub-drain-events",
                "Return and remove all pending LSPS events and notifications",
                rpc_methods::drain_events,
            )
            .rpcmethod(
                "lsps-hub-set-protocols",
                "Change the protocols advertised in lsps0.list_protocols",
                rpc_methods::set_protocols,
            )
            .hook("custommsg", handle_custom_msg)
            .configure()
            .await?
        {
            Some(p) => p,
            None => return Ok(()),
        };

    let options = PluginOptions::from_values(|name| configured_plugin.option(name))
        .context("Invalid plugin configuration")?;

    let (incoming, incoming_rx) = mpsc::channel(INCOMING_BUFFER);
    let rpc_file = configured_plugin.configuration().rpc_file;
    let node = Arc::new(ClnLightningNode::new(rpc_file.into(), incoming_rx));
    let hub = Arc::new(LspsHub::new(node.clone(), options.hub_config.clone()));
    let state = PluginState::new(hub.clone(), node, incoming);
    let cancel = state.cancel.clone();

    let plugin = configured_plugin.start(state.clone()).await?;

    let dispatcher = {
        let hub = hub.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = hub.run(&cancel).await {
                log::warn!("LSPS dispatcher stopped: {}", err);
            }
        })
    };

    match options.nostr_pubkey {
        Some(local_pubkey) => {
            let listener = hub.nostr_listener(
                local_pubkey,
                Arc::new(NostrSdkPool),
                state.notifications.clone(),
            );
            let trusted = options.trusted_pubkeys.clone();
            listener.set_trusted_pubkey_accessor(Arc::new(move || trusted.clone()));

            let cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(err) = listener.run(&cancel).await {
                    log::warn!("Nostr listener stopped: {}", err);
                }
            });
        }
        None => log::info!(
            "'{}' is not set. LSPS5 notifications over nostr are disabled",
            options::NOSTR_PUBKEY
        ),
    }

    let result = plugin.join().await;

    cancel.cancel();
    hub.shutdown();
    let _ = dispatcher.await;
    result
}

async fn handle_custom_msg(
    plugin: Plugin<PluginState>,
    request: serde_json::Value,
) -> Result<serde_json::Value> {
    let rpc_message = serde_json::from_value::<RpcCustomMsgMessage>(request)
        .context("Failed to parse custom msg hook")?;

    // Other plugins might still be interested in the message
    match rpc_message.to_custom_message() {
        Ok(message) => {
            if let Err(err) = plugin.state().incoming.try_send(Ok(message)) {
                log::warn!("Dropping custom message from {}: {}", rpc_message.peer_id, err);
            }
        }
        Err(err) => log::debug!("Ignoring custom message from {}: {:#}", rpc_message.peer_id, err),
    }

    do_continue()
}

fn do_continue() -> Result<serde_json::Value> {
    Ok(json!({"result" : "continue"}))
}
