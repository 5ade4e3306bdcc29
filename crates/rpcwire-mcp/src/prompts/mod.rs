//! Built-in MCP prompt implementations.

pub mod describe_method;
pub mod explain_error;
pub mod registry;

pub use registry::BuiltinPrompts;
