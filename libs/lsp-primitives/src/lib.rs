//! Wire-level primitives shared by LSPS clients and services.
//!
//! - `json_rpc`: the JSON-RPC 2.0 envelope used by every LSPS protocol
//! - `lsps0`, `lsps1`, `lsps5`: schemas of the individual protocols
//! - `methods`: a typed table of all rpc-methods
pub mod json_rpc;
pub mod lsps0;
pub mod lsps1;
pub mod lsps5;
pub mod methods;
pub mod no_params;

pub use secp256k1;
