//! MCP protocol handling - handler registry and JSON-RPC dispatch.

pub mod handler;
pub mod negotiation;
pub mod providers;
pub mod registry;

pub use handler::ProtocolHandler;
pub use providers::{PromptProvider, ResourceProvider, ToolProvider};
pub use registry::{HandlerFn, HandlerRegistry, HandlerRegistryBuilder, CAPABILITY_METHODS};
