//! rpcwire MCP server - JSON-RPC 2.0 dispatch over stdio and streaming HTTP.

pub mod config;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod tools;
pub mod transport;
pub mod types;

use std::sync::Arc;

pub use config::{HttpConfig, ServeArgs, ServerConfig, TransportKind};
pub use protocol::{HandlerRegistry, ProtocolHandler};
pub use transport::{build_driver, StdioDriver, TransportDriver};

/// Registry wired to the built-in prompts, resources and tools.
pub fn builtin_registry(init: &types::InitOptions) -> HandlerRegistry {
    HandlerRegistry::from_providers(
        Arc::new(prompts::BuiltinPrompts),
        Arc::new(resources::BuiltinResources::new(init.clone())),
        Arc::new(tools::BuiltinTools),
    )
}
