//! Built-in tool set and dispatch.

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::ToolProvider;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition, ToolListResult};

use super::{current_time, echo, error_code};

/// The tools served when no external collaborator is plugged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinTools;

impl BuiltinTools {
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            echo::definition(),
            current_time::definition(),
            error_code::definition(),
        ]
    }
}

#[async_trait]
impl ToolProvider for BuiltinTools {
    async fn list(&self) -> McpResult<ToolListResult> {
        Ok(ToolListResult {
            tools: Self::definitions(),
            next_cursor: None,
        })
    }

    async fn call(&self, name: &str, arguments: Option<Value>) -> McpResult<ToolCallResult> {
        let args = arguments.unwrap_or(Value::Object(serde_json::Map::new()));

        match name {
            "echo" => echo::execute(args).await,
            "current_time" => current_time::execute(args).await,
            "error_code" => error_code::execute(args).await,
            _ => Err(McpError::ToolNotFound(name.to_string())),
        }
    }
}
