//! LSPS0: the transport protocol every other LSPS builds on.
pub mod client;
pub mod service;

pub use client::Lsps0Client;
pub use service::{Lsps0Service, DEFAULT_SUPPORTED_PROTOCOLS};
