//! Built-in MCP resource implementations.

pub mod registry;
pub mod server;
pub mod templates;

pub use registry::BuiltinResources;
