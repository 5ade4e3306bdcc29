//! Built-in resource set and dispatch.

use async_trait::async_trait;

use crate::protocol::ResourceProvider;
use crate::types::{InitOptions, McpError, McpResult, ReadResourceResult, ResourceListResult};

use super::{server, templates};

#[derive(Debug, Default, Clone)]
pub struct BuiltinResources {
    init: InitOptions,
}

impl BuiltinResources {
    pub fn new(init: InitOptions) -> Self {
        Self { init }
    }
}

#[async_trait]
impl ResourceProvider for BuiltinResources {
    async fn list(&self) -> McpResult<ResourceListResult> {
        Ok(ResourceListResult {
            resources: templates::list_resources(),
            next_cursor: None,
        })
    }

    async fn read(&self, uri: &str) -> McpResult<ReadResourceResult> {
        match uri {
            templates::INFO_URI => server::read_info(&self.init),
            templates::METHODS_URI => server::read_methods(),
            _ => Err(McpError::ResourceNotFound(uri.to_string())),
        }
    }
}
