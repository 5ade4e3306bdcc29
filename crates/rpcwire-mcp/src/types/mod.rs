//! All MCP data types used by the server.

pub mod capabilities;
pub mod error;
pub mod request;
pub mod response;

pub use capabilities::*;
pub use error::*;
pub use request::*;
pub use response::*;

pub use rpcwire::{
    ErrorObject, JsonRpcMessage, Meta, Params, ProtocolError, RequestId, JSONRPC_VERSION,
    META_KEY,
};
