//! Defines all rpc-methods
//!
//! The generics of a [`JsonRpcMethod`] are `<I, O, E>` where
//! - I represents the params
//! - O represents the result data
//! - E represents the error-data if present
//!
//! To add a method
//! 1. Define a constant for it
//! 2. Add it to [`JsonRpcMethodEnum`] and its `from_method_name` and `name` functions
use crate::json_rpc::{DefaultError, JsonRpcMethod, NoParams};
pub use crate::lsps0::schema::{ListprotocolsResponse, Lsps0GetInfoResponse};
pub use crate::lsps1::schema::{
    Lsps1CreateOrderRequest, Lsps1CreateOrderResponse, Lsps1GetInfoResponse, Lsps1GetOrderRequest,
    Lsps1GetOrderResponse,
};
pub use crate::lsps5::schema::{
    Lsps5ListWebhooksResponse, Lsps5RemoveWebhookRequest, Lsps5RemoveWebhookResponse,
    Lsps5SetWebhookRequest, Lsps5SetWebhookResponse,
};

use serde::de::{Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use anyhow::{anyhow, Result};

pub type Lsps0ListProtocols = JsonRpcMethod<'static, NoParams, ListprotocolsResponse, DefaultError>;
pub type Lsps0GetInfo = JsonRpcMethod<'static, NoParams, Lsps0GetInfoResponse, DefaultError>;

pub type Lsps1GetInfo = JsonRpcMethod<'static, NoParams, Lsps1GetInfoResponse, DefaultError>;
pub type Lsps1CreateOrder =
    JsonRpcMethod<'static, Lsps1CreateOrderRequest, Lsps1CreateOrderResponse, DefaultError>;
pub type Lsps1GetOrder =
    JsonRpcMethod<'static, Lsps1GetOrderRequest, Lsps1GetOrderResponse, DefaultError>;

pub type Lsps5SetWebhook =
    JsonRpcMethod<'static, Lsps5SetWebhookRequest, Lsps5SetWebhookResponse, DefaultError>;
pub type Lsps5ListWebhooks =
    JsonRpcMethod<'static, NoParams, Lsps5ListWebhooksResponse, DefaultError>;
pub type Lsps5RemoveWebhook =
    JsonRpcMethod<'static, Lsps5RemoveWebhookRequest, Lsps5RemoveWebhookResponse, DefaultError>;

// LSPS0: Transport layer
pub const LSPS0_LIST_PROTOCOLS: Lsps0ListProtocols =
    Lsps0ListProtocols::new("lsps0.list_protocols");
pub const LSPS0_GET_INFO: Lsps0GetInfo = Lsps0GetInfo::new("lsps0.get_info");

// LSPS1: Buy Channels
pub const LSPS1_GET_INFO: Lsps1GetInfo = Lsps1GetInfo::new("lsps1.get_info");
pub const LSPS1_CREATE_ORDER: Lsps1CreateOrder = Lsps1CreateOrder::new("lsps1.create_order");
pub const LSPS1_GET_ORDER: Lsps1GetOrder = Lsps1GetOrder::new("lsps1.get_order");

// LSPS5: Webhooks
pub const LSPS5_SET_WEBHOOK: Lsps5SetWebhook = Lsps5SetWebhook::new("lsps5.set_webhook");
pub const LSPS5_LIST_WEBHOOKS: Lsps5ListWebhooks = Lsps5ListWebhooks::new("lsps5.list_webhooks");
pub const LSPS5_REMOVE_WEBHOOK: Lsps5RemoveWebhook =
    Lsps5RemoveWebhook::new("lsps5.remove_webhook");

#[derive(Debug, Clone, Copy)]
pub enum JsonRpcMethodEnum {
    Lsps0ListProtocols(Lsps0ListProtocols),
    Lsps0GetInfo(Lsps0GetInfo),
    Lsps1GetInfo(Lsps1GetInfo),
    Lsps1CreateOrder(Lsps1CreateOrder),
    Lsps1GetOrder(Lsps1GetOrder),
    Lsps5SetWebhook(Lsps5SetWebhook),
    Lsps5ListWebhooks(Lsps5ListWebhooks),
    Lsps5RemoveWebhook(Lsps5RemoveWebhook),
}

impl Serialize for JsonRpcMethodEnum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for JsonRpcMethodEnum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct JsonRpcMethodEnumVisitor;

        impl<'de> Visitor<'de> for JsonRpcMethodEnumVisitor {
            type Value = JsonRpcMethodEnum;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("A valid rpc-method name")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                JsonRpcMethodEnum::from_method_name(value).map_err(|e| E::custom(e.to_string()))
            }
        }

        deserializer.deserialize_str(JsonRpcMethodEnumVisitor)
    }
}

impl JsonRpcMethodEnum {
    pub fn from_method_name(value: &str) -> Result<JsonRpcMethodEnum> {
        match value {
            "lsps0.list_protocols" => Ok(Self::Lsps0ListProtocols(LSPS0_LIST_PROTOCOLS)),
            "lsps0.get_info" => Ok(Self::Lsps0GetInfo(LSPS0_GET_INFO)),
            "lsps1.get_info" => Ok(Self::Lsps1GetInfo(LSPS1_GET_INFO)),
            "lsps1.create_order" => Ok(Self::Lsps1CreateOrder(LSPS1_CREATE_ORDER)),
            "lsps1.get_order" => Ok(Self::Lsps1GetOrder(LSPS1_GET_ORDER)),
            "lsps5.set_webhook" => Ok(Self::Lsps5SetWebhook(LSPS5_SET_WEBHOOK)),
            "lsps5.list_webhooks" => Ok(Self::Lsps5ListWebhooks(LSPS5_LIST_WEBHOOKS)),
            "lsps5.remove_webhook" => Ok(Self::Lsps5RemoveWebhook(LSPS5_REMOVE_WEBHOOK)),
            default => Err(anyhow!("Unknown method '{}'", default)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lsps0ListProtocols(x) => x.name(),
            Self::Lsps0GetInfo(x) => x.name(),
            Self::Lsps1GetInfo(x) => x.name(),
            Self::Lsps1CreateOrder(x) => x.name(),
            Self::Lsps1GetOrder(x) => x.name(),
            Self::Lsps5SetWebhook(x) => x.name(),
            Self::Lsps5ListWebhooks(x) => x.name(),
            Self::Lsps5RemoveWebhook(x) => x.name(),
        }
    }
}
