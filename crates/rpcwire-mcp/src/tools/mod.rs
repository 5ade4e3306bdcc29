//! Built-in MCP tool implementations.

pub mod current_time;
pub mod echo;
pub mod error_code;
pub mod registry;

pub use registry::BuiltinTools;
