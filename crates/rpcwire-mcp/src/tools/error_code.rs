//! Tool: error_code - Look up a JSON-RPC error code.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::types::{describe_code, McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct ErrorCodeParams {
    code: i32,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "error_code".to_string(),
        description: Some("Explain a JSON-RPC or MCP error code".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "code": { "type": "integer", "description": "Error code, e.g. -32601" }
            },
            "required": ["code"]
        }),
    }
}

pub async fn execute(args: Value) -> McpResult<ToolCallResult> {
    let params: ErrorCodeParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    match describe_code(params.code) {
        Some((name, meaning)) => Ok(ToolCallResult::json(&json!({
            "code": params.code,
            "name": name,
            "meaning": meaning,
        }))),
        // Unknown codes are a tool-level failure, not a protocol error.
        None => Ok(ToolCallResult::error(format!(
            "Unknown error code: {}",
            params.code
        ))),
    }
}
