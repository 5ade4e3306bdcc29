//! Error types and JSON-RPC error codes for the MCP server.

use rpcwire::{ErrorObject, JsonRpcMessage, ProtocolError, RequestId};

pub use rpcwire::error_codes;

/// MCP-specific error codes.
pub mod mcp_error_codes {
    pub const RESOURCE_NOT_FOUND: i32 = -32802;
    pub const TOOL_NOT_FOUND: i32 = -32803;
    pub const PROMPT_NOT_FOUND: i32 = -32804;

    /// Server: worker lifecycle transition not allowed in the current state.
    pub const INVALID_STATE: i32 = -32850;
    /// Server: configuration rejected at start-up.
    pub const CONFIG_ERROR: i32 = -32851;

    /// Server: Unauthorized (missing or invalid bearer token).
    pub const UNAUTHORIZED: i32 = -32900;
}

/// All errors that can occur in the MCP server.
#[derive(thiserror::Error, Debug)]
pub enum McpError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unauthorized - missing or invalid bearer token.
    #[error("Unauthorized")]
    Unauthorized,
}

impl McpError {
    pub fn code(&self) -> i32 {
        use error_codes::*;
        use mcp_error_codes::*;
        match self {
            McpError::Protocol(e) => e.code(),
            McpError::MethodNotFound(_) => METHOD_NOT_FOUND,
            McpError::InvalidParams(_) => INVALID_PARAMS,
            McpError::InternalError(_) => INTERNAL_ERROR,
            McpError::ResourceNotFound(_) => RESOURCE_NOT_FOUND,
            McpError::ToolNotFound(_) => TOOL_NOT_FOUND,
            McpError::PromptNotFound(_) => PROMPT_NOT_FOUND,
            McpError::InvalidState(_) => INVALID_STATE,
            McpError::Config(_) => CONFIG_ERROR,
            McpError::Transport(_) | McpError::Io(_) => INTERNAL_ERROR,
            McpError::Json(_) => PARSE_ERROR,
            McpError::Unauthorized => UNAUTHORIZED,
        }
    }

    pub fn to_error_object(&self) -> ErrorObject {
        ErrorObject::new(self.code(), self.to_string())
    }

    pub fn to_error_message(&self, id: RequestId) -> JsonRpcMessage {
        JsonRpcMessage::error(id, self.to_error_object())
    }
}

pub type McpResult<T> = Result<T, McpError>;

/// Name and meaning of a well-known error code.
pub fn describe_code(code: i32) -> Option<(&'static str, &'static str)> {
    use error_codes::*;
    use mcp_error_codes::*;
    let described = match code {
        PARSE_ERROR => ("Parse error", "The message could not be decoded or built."),
        INVALID_REQUEST => (
            "Invalid request",
            "The message is not a valid JSON-RPC 2.0 message shape.",
        ),
        METHOD_NOT_FOUND => ("Method not found", "No handler is registered for the method."),
        INVALID_PARAMS => ("Invalid params", "The params do not match what the method expects."),
        INTERNAL_ERROR => ("Internal error", "The handler failed while serving the request."),
        RESOURCE_NOT_FOUND => ("Resource not found", "No resource exists at the given URI."),
        TOOL_NOT_FOUND => ("Tool not found", "No tool with that name is registered."),
        PROMPT_NOT_FOUND => ("Prompt not found", "No prompt with that name is registered."),
        INVALID_STATE => (
            "Invalid state",
            "The worker cannot perform that lifecycle transition now.",
        ),
        CONFIG_ERROR => ("Configuration error", "The server configuration was rejected."),
        UNAUTHORIZED => ("Unauthorized", "A valid bearer token is required."),
        _ => return None,
    };
    Some(described)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(McpError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(McpError::InvalidParams("x".into()).code(), -32602);
        assert_eq!(McpError::ToolNotFound("x".into()).code(), -32803);
        assert_eq!(
            McpError::from(ProtocolError::ParseError("bad".into())).code(),
            -32700
        );
    }

    #[test]
    fn test_describe_code() {
        assert_eq!(describe_code(-32601).map(|d| d.0), Some("Method not found"));
        assert!(describe_code(42).is_none());
    }

    #[test]
    fn test_protocol_message_is_transparent() {
        let err = McpError::from(ProtocolError::InvalidRequest("jsonrpc version must be 2.0".into()));
        assert_eq!(err.to_string(), "Invalid request: jsonrpc version must be 2.0");
    }
}
