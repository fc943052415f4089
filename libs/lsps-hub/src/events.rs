//! Events emitted by the LSPS1 and LSPS5 clients.
//!
//! Each request sent through those clients produces exactly one event,
//! either describing the result or the failure.
use lsp_primitives::json_rpc::JsonRpcId;
use lsp_primitives::lsps0::common_schemas::{IsoDatetime, PublicKey};
use lsp_primitives::lsps1::schema::{
    Lsps1ChannelInfo, Lsps1CreateOrderResponse, Lsps1Options, Lsps1OrderParams, Lsps1PaymentInfo,
};
use serde::Serialize;

use crate::error::RpcError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Lsps1Client(Lsps1ClientEvent),
    Lsps5Client(Lsps5ClientEvent),
}

impl Event {
    /// A stable name that identifies the kind of event
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Lsps1Client(e) => e.event_type(),
            Self::Lsps5Client(e) => e.event_type(),
        }
    }

    pub fn request_id(&self) -> &JsonRpcId {
        match self {
            Self::Lsps1Client(e) => e.request_id(),
            Self::Lsps5Client(e) => e.request_id(),
        }
    }

    pub fn counterparty_node_id(&self) -> &PublicKey {
        match self {
            Self::Lsps1Client(e) => e.counterparty_node_id(),
            Self::Lsps5Client(e) => e.counterparty_node_id(),
        }
    }
}

impl From<Lsps1ClientEvent> for Event {
    fn from(event: Lsps1ClientEvent) -> Self {
        Self::Lsps1Client(event)
    }
}

impl From<Lsps5ClientEvent> for Event {
    fn from(event: Lsps5ClientEvent) -> Self {
        Self::Lsps5Client(event)
    }
}

/// The state of an order as reported by the LSP
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lsps1Order {
    pub order_id: String,
    pub order: Lsps1OrderParams,
    pub order_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<IsoDatetime>,
    pub payment: Lsps1PaymentInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Lsps1ChannelInfo>,
}

impl From<Lsps1CreateOrderResponse> for Lsps1Order {
    fn from(response: Lsps1CreateOrderResponse) -> Self {
        Self {
            order_id: response.order_id,
            order: response.order,
            order_state: response.order_state,
            created_at: response.created_at,
            payment: response.payment,
            channel: response.channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Lsps1ClientEvent {
    /// Answer to `lsps1.get_info`
    SupportedOptionsReady {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        supported_options: Lsps1Options,
    },
    SupportedOptionsRequestFailed {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        error: RpcError,
    },
    /// Answer to `lsps1.create_order`
    OrderCreated {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        #[serde(flatten)]
        order: Lsps1Order,
    },
    OrderRequestFailed {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        error: RpcError,
    },
    /// Answer to `lsps1.get_order`
    OrderStatus {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        #[serde(flatten)]
        order: Lsps1Order,
    },
    OrderStatusRequestFailed {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        error: RpcError,
    },
}

impl Lsps1ClientEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SupportedOptionsReady { .. } => "lsps1_supported_options_ready",
            Self::SupportedOptionsRequestFailed { .. } => "lsps1_supported_options_request_failed",
            Self::OrderCreated { .. } => "lsps1_order_created",
            Self::OrderRequestFailed { .. } => "lsps1_order_request_failed",
            Self::OrderStatus { .. } => "lsps1_order_status",
            Self::OrderStatusRequestFailed { .. } => "lsps1_order_status_request_failed",
        }
    }

    pub fn request_id(&self) -> &JsonRpcId {
        match self {
            Self::SupportedOptionsReady { request_id, .. }
            | Self::SupportedOptionsRequestFailed { request_id, .. }
            | Self::OrderCreated { request_id, .. }
            | Self::OrderRequestFailed { request_id, .. }
            | Self::OrderStatus { request_id, .. }
            | Self::OrderStatusRequestFailed { request_id, .. } => request_id,
        }
    }

    pub fn counterparty_node_id(&self) -> &PublicKey {
        match self {
            Self::SupportedOptionsReady {
                counterparty_node_id,
                ..
            }
            | Self::SupportedOptionsRequestFailed {
                counterparty_node_id,
                ..
            }
            | Self::OrderCreated {
                counterparty_node_id,
                ..
            }
            | Self::OrderRequestFailed {
                counterparty_node_id,
                ..
            }
            | Self::OrderStatus {
                counterparty_node_id,
                ..
            }
            | Self::OrderStatusRequestFailed {
                counterparty_node_id,
                ..
            } => counterparty_node_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Lsps5ClientEvent {
    WebhookRegistered {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        num_webhooks: u32,
        max_webhooks: u32,
        /// The LSP already knew this webhook
        no_change: bool,
        app_name: String,
        url: String,
    },
    WebhookRegistrationFailed {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        error: RpcError,
        app_name: String,
        url: String,
    },
    WebhooksListed {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        app_names: Vec<String>,
        max_webhooks: u32,
    },
    WebhooksListFailed {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        error: RpcError,
    },
    WebhookRemoved {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        app_name: String,
    },
    WebhookRemovalFailed {
        request_id: JsonRpcId,
        counterparty_node_id: PublicKey,
        error: RpcError,
        app_name: String,
    },
}

impl Lsps5ClientEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::WebhookRegistered { .. } => "lsps5_webhook_registered",
            Self::WebhookRegistrationFailed { .. } => "lsps5_webhook_registration_failed",
            Self::WebhooksListed { .. } => "lsps5_webhooks_listed",
            Self::WebhooksListFailed { .. } => "lsps5_webhooks_list_failed",
            Self::WebhookRemoved { .. } => "lsps5_webhook_removed",
            Self::WebhookRemovalFailed { .. } => "lsps5_webhook_removal_failed",
        }
    }

    pub fn request_id(&self) -> &JsonRpcId {
        match self {
            Self::WebhookRegistered { request_id, .. }
            | Self::WebhookRegistrationFailed { request_id, .. }
            | Self::WebhooksListed { request_id, .. }
            | Self::WebhooksListFailed { request_id, .. }
            | Self::WebhookRemoved { request_id, .. }
            | Self::WebhookRemovalFailed { request_id, .. } => request_id,
        }
    }

    pub fn counterparty_node_id(&self) -> &PublicKey {
        match self {
            Self::WebhookRegistered {
                counterparty_node_id,
                ..
            }
            | Self::WebhookRegistrationFailed {
                counterparty_node_id,
                ..
            }
            | Self::WebhooksListed {
                counterparty_node_id,
                ..
            }
            | Self::WebhooksListFailed {
                counterparty_node_id,
                ..
            }
            | Self::WebhookRemoved {
                counterparty_node_id,
                ..
            }
            | Self::WebhookRemovalFailed {
                counterparty_node_id,
                ..
            } => counterparty_node_id,
        }
    }
}
