//! Method-name keyed handler registry.
//!
//! Built once at start-up and shared read-only between transports. Nothing
//! can be registered after [`HandlerRegistryBuilder::build`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::types::{
    McpError, McpResult, Params, PromptGetParams, ResourceReadParams, ToolCallParams,
};

use super::providers::{PromptProvider, ResourceProvider, ToolProvider};

/// The capability methods every server registers at boot.
pub const CAPABILITY_METHODS: [&str; 6] = [
    "prompts/list",
    "prompts/get",
    "resources/list",
    "resources/read",
    "tools/list",
    "tools/call",
];

pub type HandlerFuture = BoxFuture<'static, McpResult<Value>>;

/// A registered callback. Receives the message params, if any.
pub type HandlerFn = Arc<dyn Fn(Option<Params>) -> HandlerFuture + Send + Sync>;

/// Immutable map from method name to handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}

/// Collects handlers before the registry is frozen.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerRegistryBuilder {
    /// Register `handler` under `method`. A later registration of the same
    /// name replaces the earlier one.
    pub fn register<F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Option<Params>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<Value>> + Send + 'static,
    {
        let method = method.into();
        let handler: HandlerFn = Arc::new(move |params| handler(params).boxed());
        if self.handlers.insert(method.clone(), handler).is_some() {
            tracing::warn!("Handler for {method} registered twice; keeping the latest");
        }
        self
    }

    pub fn build(self) -> HandlerRegistry {
        tracing::debug!("Handler registry frozen with {} methods", self.handlers.len());
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Wire the six capability methods to the given collaborators.
    pub fn from_providers(
        prompts: Arc<dyn PromptProvider>,
        resources: Arc<dyn ResourceProvider>,
        tools: Arc<dyn ToolProvider>,
    ) -> Self {
        let p_list = prompts.clone();
        let p_get = prompts;
        let r_list = resources.clone();
        let r_read = resources;
        let t_list = tools.clone();
        let t_call = tools;

        Self::builder()
            .register("prompts/list", move |_| {
                let prompts = p_list.clone();
                async move { to_result(prompts.list().await?) }
            })
            .register("prompts/get", move |params| {
                let prompts = p_get.clone();
                async move {
                    let p: PromptGetParams = required(params, "Prompt get params required")?;
                    to_result(prompts.get(&p.name, p.arguments).await?)
                }
            })
            .register("resources/list", move |_| {
                let resources = r_list.clone();
                async move { to_result(resources.list().await?) }
            })
            .register("resources/read", move |params| {
                let resources = r_read.clone();
                async move {
                    let p: ResourceReadParams =
                        required(params, "Resource read params required")?;
                    to_result(resources.read(&p.uri).await?)
                }
            })
            .register("tools/list", move |_| {
                let tools = t_list.clone();
                async move { to_result(tools.list().await?) }
            })
            .register("tools/call", move |params| {
                let tools = t_call.clone();
                async move {
                    let p: ToolCallParams = required(params, "Tool call params required")?;
                    to_result(tools.call(&p.name, p.arguments).await?)
                }
            })
            .build()
    }

    pub fn get(&self, method: &str) -> Option<&HandlerFn> {
        self.handlers.get(method)
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn required<T: DeserializeOwned>(params: Option<Params>, missing: &str) -> McpResult<T> {
    params
        .ok_or_else(|| McpError::InvalidParams(missing.to_string()))?
        .parse()
        .map_err(|e| McpError::InvalidParams(e.to_string()))
}

fn to_result<T: Serialize>(value: T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError(e.to_string()))
}
