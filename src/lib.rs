//! LSPS client and service stack for a Lightning node.
//!
//! - [`lsp_primitives`]: JSON-RPC envelope and the LSPS0/LSPS1/LSPS5 schemas
//! - [`lsps_hub`]: transport, handlers, event queue and the Nostr listener
//!
//! The Core Lightning plugin lives in `plugins/lsps-hub-plugin`.
pub use lsp_primitives;
pub use lsps_hub;
