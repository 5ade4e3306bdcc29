//! Resources: rpcwire://server/info and rpcwire://server/methods

use serde_json::json;

use crate::protocol::CAPABILITY_METHODS;
use crate::types::{InitOptions, McpResult, ReadResourceResult, MCP_VERSION};

use super::templates::{INFO_URI, METHODS_URI};

pub fn read_info(init: &InitOptions) -> McpResult<ReadResourceResult> {
    let content = json!({
        "name": init.server_info.name,
        "version": init.server_info.version,
        "protocol_version": MCP_VERSION,
        "jsonrpc": rpcwire::JSONRPC_VERSION,
    });

    Ok(ReadResourceResult::json(INFO_URI, &content))
}

pub fn read_methods() -> McpResult<ReadResourceResult> {
    let content = json!({
        "builtin": ["initialize", "ping"],
        "capabilities": CAPABILITY_METHODS,
        "notifications": ["notifications/initialized", "notifications/cancelled"],
    });

    Ok(ReadResourceResult::json(METHODS_URI, &content))
}
