//! rpcwire - JSON-RPC 2.0 message model and classifier.
//!
//! Turns untyped JSON payloads into one of four typed message kinds and
//! produces correctly-coded protocol errors when that is not possible.

pub mod classify;
pub mod codec;
pub mod params;
pub mod types;

pub use classify::{classify, classify_value, recover_id};
pub use codec::{decode, decode_slice, encode, parse_json};
pub use params::Params;
pub use types::*;
