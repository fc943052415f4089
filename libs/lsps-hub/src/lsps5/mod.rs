//! LSPS5: registering webhooks with an LSP.
pub mod client;

pub use client::Lsps5Client;
