//! Static resource definitions.

use crate::types::ResourceDefinition;

pub const INFO_URI: &str = "rpcwire://server/info";
pub const METHODS_URI: &str = "rpcwire://server/methods";

pub fn list_resources() -> Vec<ResourceDefinition> {
    vec![
        ResourceDefinition {
            uri: INFO_URI.to_string(),
            name: "Server Info".to_string(),
            description: Some("Server name, version and protocol version".to_string()),
            mime_type: Some("application/json".to_string()),
        },
        ResourceDefinition {
            uri: METHODS_URI.to_string(),
            name: "Server Methods".to_string(),
            description: Some("Methods this server answers".to_string()),
            mime_type: Some("application/json".to_string()),
        },
    ]
}
