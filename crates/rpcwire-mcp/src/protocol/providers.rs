//! Collaborator interfaces behind the capability methods.
//!
//! The server never knows what a tool or resource does; it only needs
//! something it can ask to list and invoke them.

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{
    McpResult, PromptGetResult, PromptListResult, ReadResourceResult, ResourceListResult,
    ToolCallResult, ToolListResult,
};

#[async_trait]
pub trait PromptProvider: Send + Sync {
    async fn list(&self) -> McpResult<PromptListResult>;

    async fn get(&self, name: &str, arguments: Option<Value>) -> McpResult<PromptGetResult>;
}

#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn list(&self) -> McpResult<ResourceListResult>;

    async fn read(&self, uri: &str) -> McpResult<ReadResourceResult>;
}

#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn list(&self) -> McpResult<ToolListResult>;

    async fn call(&self, name: &str, arguments: Option<Value>) -> McpResult<ToolCallResult>;
}
