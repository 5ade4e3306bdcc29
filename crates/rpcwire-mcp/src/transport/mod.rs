//! Transport layer for MCP communication.

pub mod framing;
#[cfg(feature = "http")]
pub mod http;
pub mod stdio;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ServerConfig, TransportKind};
use crate::protocol::HandlerRegistry;
use crate::types::{InitOptions, McpResult};

#[cfg(feature = "http")]
pub use http::HttpDriver;
pub use stdio::StdioDriver;

/// A way of moving messages between clients and the dispatcher.
///
/// `run` consumes the driver and returns once the transport has shut down.
#[async_trait]
pub trait TransportDriver: Send {
    async fn run(self: Box<Self>, registry: Arc<HandlerRegistry>, init: InitOptions) -> McpResult<()>;

    fn name(&self) -> &'static str;
}

/// Pick the driver named by the configuration.
pub fn build_driver(config: &ServerConfig) -> McpResult<Box<dyn TransportDriver>> {
    match config.transport {
        TransportKind::Stdio => Ok(Box::new(StdioDriver::new())),
        #[cfg(feature = "http")]
        TransportKind::Http => Ok(Box::new(HttpDriver::new(config.http.clone()))),
        #[cfg(not(feature = "http"))]
        TransportKind::Http => Err(crate::types::McpError::Config(
            "built without the http transport".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_by_kind() {
        let stdio = build_driver(&ServerConfig::default()).unwrap();
        assert_eq!(stdio.name(), "stdio");

        #[cfg(feature = "http")]
        {
            let config = ServerConfig {
                transport: TransportKind::Http,
                ..ServerConfig::default()
            };
            assert_eq!(build_driver(&config).unwrap().name(), "http");
        }
    }
}
