//! LSPS1: buying channels from an LSP.
pub mod client;

pub use client::Lsps1Client;
