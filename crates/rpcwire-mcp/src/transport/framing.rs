//! Message framing for newline-delimited JSON.

use serde_json::Value;

use crate::types::{JsonRpcMessage, McpError, McpResult, ProtocolError};

/// Parse a single line of text as a raw JSON payload.
///
/// The payload is not classified here so that a reply to a malformed message
/// can still be addressed to whatever id it carried.
pub fn parse_line(line: &str) -> Result<Value, ProtocolError> {
    parse_bytes(line.as_bytes())
}

/// Parse one raw line as JSON. Bytes that are not UTF-8 are a parse error.
pub fn parse_bytes(line: &[u8]) -> Result<Value, ProtocolError> {
    rpcwire::parse_json(line)
}

/// Serialize a message to a JSON line (with trailing newline).
pub fn frame_message(message: &JsonRpcMessage) -> McpResult<String> {
    let mut json = serde_json::to_string(message).map_err(McpError::Json)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorObject, RequestId};
    use serde_json::json;

    #[test]
    fn test_parse_line_trims() {
        let value = parse_line("  {\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":1}\r\n").unwrap();
        assert_eq!(value["method"], json!("ping"));
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        let err = parse_bytes(b"{\"jsonrpc\":\"2.0\",\"id\":\"\xff\xfe\",\"method\":\"ping\"}\n").unwrap_err();
        assert_eq!(err.code(), -32700);
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        let err = parse_line("{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::ParseError(_)));
    }

    #[test]
    fn test_frame_is_single_line() {
        let msg = JsonRpcMessage::error(RequestId::from(9), ErrorObject::new(-32601, "a\nb"));
        let framed = frame_message(&msg).unwrap();
        assert!(framed.ends_with('\n'));
        assert_eq!(framed.matches('\n').count(), 1);
    }
}
