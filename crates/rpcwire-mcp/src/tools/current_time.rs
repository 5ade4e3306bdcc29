//! Tool: current_time - Report the server clock.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::types::{McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "current_time".to_string(),
        description: Some("Current server time in UTC (RFC 3339)".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {}
        }),
    }
}

pub async fn execute(_args: Value) -> McpResult<ToolCallResult> {
    let now = Utc::now();

    Ok(ToolCallResult::json(&json!({
        "utc": now.to_rfc3339_opts(SecondsFormat::Secs, true),
        "unix": now.timestamp(),
    })))
}
