//! Core data types for JSON-RPC 2.0 messages.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::params::Params;

/// JSON-RPC 2.0 protocol version.
pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved key carrying out-of-band metadata inside `params` and `result`.
pub const META_KEY: &str = "_meta";

/// Opaque metadata map carried under [`META_KEY`].
pub type Meta = Map<String, Value>;

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Correlation identifier, either a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl RequestId {
    /// Read an id from a raw JSON value. Only strings and integers qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RequestId::String(s.clone())),
            Value::Number(n) => n.as_i64().map(RequestId::Number),
            _ => None,
        }
    }

    /// The id used when an error message carries none.
    pub fn empty() -> Self {
        RequestId::String(String::new())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

/// Error object within a JSON-RPC error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// A classified JSON-RPC 2.0 message.
///
/// Built only through [`crate::classify`] or the constructors below, so every
/// value is one of the four valid shapes. Serialization always emits
/// `"jsonrpc": "2.0"`.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request {
        id: RequestId,
        method: String,
        params: Option<Params>,
    },
    Notification {
        method: String,
        params: Option<Params>,
    },
    Response {
        id: RequestId,
        result: Map<String, Value>,
    },
    Error {
        id: RequestId,
        error: ErrorObject,
    },
}

impl JsonRpcMessage {
    pub fn request(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Params>) -> Self {
        JsonRpcMessage::Request {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Params>) -> Self {
        JsonRpcMessage::Notification {
            method: method.into(),
            params,
        }
    }

    pub fn response(id: RequestId, result: Map<String, Value>) -> Self {
        JsonRpcMessage::Response { id, result }
    }

    pub fn error(id: RequestId, error: ErrorObject) -> Self {
        JsonRpcMessage::Error { id, error }
    }

    /// Correlation id, absent only for notifications.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request { id, .. }
            | JsonRpcMessage::Response { id, .. }
            | JsonRpcMessage::Error { id, .. } => Some(id),
            JsonRpcMessage::Notification { .. } => None,
        }
    }

    /// Method name for requests and notifications.
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request { method, .. } | JsonRpcMessage::Notification { method, .. } => {
                Some(method)
            }
            _ => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request { .. })
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self, JsonRpcMessage::Response { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, JsonRpcMessage::Error { .. })
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            JsonRpcMessage::Request { .. } => "request",
            JsonRpcMessage::Notification { .. } => "notification",
            JsonRpcMessage::Response { .. } => "response",
            JsonRpcMessage::Error { .. } => "error",
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for JsonRpcMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
        match self {
            JsonRpcMessage::Request { id, method, params } => {
                map.serialize_entry("id", id)?;
                map.serialize_entry("method", method)?;
                if let Some(params) = params {
                    map.serialize_entry("params", params)?;
                }
            }
            JsonRpcMessage::Notification { method, params } => {
                map.serialize_entry("method", method)?;
                if let Some(params) = params {
                    map.serialize_entry("params", params)?;
                }
            }
            JsonRpcMessage::Response { id, result } => {
                map.serialize_entry("id", id)?;
                map.serialize_entry("result", result)?;
            }
            JsonRpcMessage::Error { id, error } => {
                map.serialize_entry("id", id)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

/// Protocol-level failures produced while classifying a payload.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ProtocolError {
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            ProtocolError::ParseError(_) => error_codes::PARSE_ERROR,
        }
    }

    /// The bare diagnostic, without the category prefix.
    pub fn detail(&self) -> &str {
        match self {
            ProtocolError::InvalidRequest(msg) | ProtocolError::ParseError(msg) => msg,
        }
    }

    pub fn to_error_object(&self) -> ErrorObject {
        ErrorObject::new(self.code(), self.to_string())
    }

    /// Wrap this failure into an error message addressed to `id`.
    pub fn to_message(&self, id: RequestId) -> JsonRpcMessage {
        JsonRpcMessage::error(id, self.to_error_object())
    }
}

/// Convenience result type.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
