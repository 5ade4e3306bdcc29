//! Built-in prompt set and dispatch.

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::PromptProvider;
use crate::types::{
    McpError, McpResult, PromptArgument, PromptDefinition, PromptGetResult, PromptListResult,
};

use super::{describe_method, explain_error};

#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinPrompts;

impl BuiltinPrompts {
    pub fn definitions() -> Vec<PromptDefinition> {
        vec![
            PromptDefinition {
                name: "explain_error".to_string(),
                description: Some("Explain a JSON-RPC error code and how to fix the call".to_string()),
                arguments: Some(vec![PromptArgument {
                    name: "code".to_string(),
                    description: Some("The error code, e.g. -32601".to_string()),
                    required: true,
                }]),
            },
            PromptDefinition {
                name: "describe_method".to_string(),
                description: Some("Describe one MCP method".to_string()),
                arguments: Some(vec![PromptArgument {
                    name: "method".to_string(),
                    description: Some("Method name, e.g. tools/call".to_string()),
                    required: true,
                }]),
            },
        ]
    }
}

#[async_trait]
impl PromptProvider for BuiltinPrompts {
    async fn list(&self) -> McpResult<PromptListResult> {
        Ok(PromptListResult {
            prompts: Self::definitions(),
            next_cursor: None,
        })
    }

    async fn get(&self, name: &str, arguments: Option<Value>) -> McpResult<PromptGetResult> {
        let args = arguments.unwrap_or(Value::Object(serde_json::Map::new()));

        match name {
            "explain_error" => explain_error::expand(args),
            "describe_method" => describe_method::expand(args),
            _ => Err(McpError::PromptNotFound(name.to_string())),
        }
    }
}
