//! Tool: echo - Return the given text unchanged.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct EchoParams {
    text: String,
    #[serde(default)]
    uppercase: bool,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "echo".to_string(),
        description: Some("Echo text back to the caller".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to echo" },
                "uppercase": { "type": "boolean", "default": false, "description": "Uppercase the reply" }
            },
            "required": ["text"]
        }),
    }
}

pub async fn execute(args: Value) -> McpResult<ToolCallResult> {
    let params: EchoParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let text = if params.uppercase {
        params.text.to_uppercase()
    } else {
        params.text
    };

    Ok(ToolCallResult::text(text))
}
