//! Client and service side of the LSPS protocols for a Lightning node.
//!
//! The hub speaks JSON-RPC over custom peer messages of type 51610.
//! Every incoming message passes through the [`dispatcher::Dispatcher`]:
//!
//! - requests are answered by the LSPS0 service
//! - responses complete an LSPS0 call or become an [`Event`] for LSPS1 and LSPS5
//!
//! LSPS5 notifications delivered over Nostr are handled by
//! [`nostr_listener::NostrLsps5Listener`].
pub mod custom_msg;
pub mod dispatcher;
pub mod error;
pub mod event_queue;
pub mod events;
pub mod hub;
pub mod lsps0;
pub mod lsps1;
pub mod lsps5;
pub mod nostr_listener;
pub mod pending;
pub mod transport;

mod sync;

#[cfg(test)]
mod test_utils;

pub use error::{HubError, Result, RpcError};
pub use event_queue::EventQueue;
pub use events::Event;
pub use hub::{HubConfig, HubConfigBuilder, LspsHub};
pub use transport::{CustomMessage, LightningNode, Transport};

pub use lsp_primitives;
pub use nostr;
