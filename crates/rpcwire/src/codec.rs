//! Text decoding: raw JSON text -> classified message.

use serde_json::Value;

use crate::classify::classify_value;
use crate::types::{JsonRpcMessage, ProtocolError, ProtocolResult};

/// Parse raw bytes as JSON. Syntax errors become [`ProtocolError::ParseError`].
pub fn parse_json(bytes: &[u8]) -> ProtocolResult<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ProtocolError::ParseError("empty message".to_string()));
    }
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::ParseError(e.to_string()))
}

/// Decode and classify one JSON-RPC message from text.
pub fn decode(text: &str) -> ProtocolResult<JsonRpcMessage> {
    decode_slice(text.as_bytes())
}

/// Decode and classify one JSON-RPC message from bytes.
pub fn decode_slice(bytes: &[u8]) -> ProtocolResult<JsonRpcMessage> {
    let value = parse_json(bytes)?;
    classify_value(&value)
}

/// Serialize a message to compact JSON text.
pub fn encode(message: &JsonRpcMessage) -> ProtocolResult<String> {
    serde_json::to_string(message).map_err(|e| ProtocolError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;

    #[test]
    fn test_decode_request() {
        let msg = decode(r#"{"jsonrpc":"2.0","id":"abc","method":"ping"}"#).unwrap();
        assert_eq!(msg.id(), Some(&RequestId::from("abc")));
        assert_eq!(msg.method(), Some("ping"));
    }

    #[test]
    fn test_malformed_json() {
        let err = decode(r#"{"broken":"#).unwrap_err();
        assert_eq!(err.code(), -32700);

        let empty = decode("   ").unwrap_err();
        assert_eq!(empty, ProtocolError::ParseError("empty message".to_string()));
    }

    #[test]
    fn test_encode_notification_with_meta() {
        let msg = decode(r#"{"jsonrpc":"2.0","method":"n","params":{"_meta":{"t":1},"x":2}}"#).unwrap();
        let text = encode(&msg).unwrap();
        assert_eq!(
            text,
            r#"{"jsonrpc":"2.0","method":"n","params":{"_meta":{"t":1},"x":2}}"#
        );
    }
}
