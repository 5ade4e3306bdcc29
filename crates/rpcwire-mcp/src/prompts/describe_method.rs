//! Prompt: describe_method - Ask for a summary of one server method.

use serde_json::Value;

use crate::protocol::CAPABILITY_METHODS;
use crate::types::{McpError, McpResult, PromptGetResult, PromptMessage};

pub fn expand(args: Value) -> McpResult<PromptGetResult> {
    let method = args
        .get("method")
        .and_then(|v| v.as_str())
        .ok_or_else(|| McpError::InvalidParams("'method' argument is required".to_string()))?;

    let known = if CAPABILITY_METHODS.contains(&method) {
        "It is one of the capability methods this server always provides."
    } else {
        "It is not one of the capability methods this server always provides."
    };

    let text = format!(
        "Describe the MCP method `{method}`.\n\
         {known}\n\n\
         Please:\n\
         1. Explain what the method does\n\
         2. Show an example request and response\n\
         3. List the errors a client should expect"
    );

    Ok(PromptGetResult {
        description: Some(format!("Describe the {method} method")),
        messages: vec![PromptMessage::user(text)],
    })
}
