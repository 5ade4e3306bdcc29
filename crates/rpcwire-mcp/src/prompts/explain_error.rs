//! Prompt: explain_error - Walk a client through a JSON-RPC error it received.

use serde_json::Value;

use crate::types::{describe_code, McpError, McpResult, PromptGetResult, PromptMessage};

pub fn expand(args: Value) -> McpResult<PromptGetResult> {
    let raw = args
        .get("code")
        .ok_or_else(|| McpError::InvalidParams("'code' argument is required".to_string()))?;

    // Prompt arguments usually arrive as strings.
    let code = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .and_then(|c| i32::try_from(c).ok())
    .ok_or_else(|| McpError::InvalidParams(format!("'code' must be an integer, got {raw}")))?;

    let detail = match describe_code(code) {
        Some((name, meaning)) => format!("Code {code} is \"{name}\": {meaning}"),
        None => format!("Code {code} is not a standard JSON-RPC or MCP error code."),
    };

    let text = format!(
        "A JSON-RPC call failed with error code {code}.\n\
         {detail}\n\n\
         Please:\n\
         1. Explain what most likely caused this error\n\
         2. Check the method name and params of the failing call\n\
         3. Suggest a corrected request"
    );

    Ok(PromptGetResult {
        description: Some("Explain a JSON-RPC error code".to_string()),
        messages: vec![PromptMessage::user(text)],
    })
}
