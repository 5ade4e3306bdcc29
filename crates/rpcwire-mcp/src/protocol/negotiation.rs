//! MCP capability negotiation during initialization.

use crate::types::{
    ClientCapabilities, Implementation, InitOptions, InitializeParams, InitializeResult,
    MCP_VERSION,
};

/// Stored client capabilities after negotiation.
#[derive(Debug, Clone, Default)]
pub struct NegotiatedCapabilities {
    pub client: ClientCapabilities,
    pub client_info: Option<Implementation>,
    pub initialized: bool,
}

impl NegotiatedCapabilities {
    pub fn negotiate(&mut self, params: InitializeParams, init: &InitOptions) -> InitializeResult {
        if params.protocol_version != MCP_VERSION {
            tracing::warn!(
                "Client requested protocol version {}, server supports {}. Proceeding with server version.",
                params.protocol_version,
                MCP_VERSION
            );
        }

        tracing::info!(
            "Initialized with client: {} v{}",
            params.client_info.name,
            params.client_info.version
        );

        self.client = params.capabilities;
        self.client_info = Some(params.client_info);

        init.initialize_result()
    }

    pub fn mark_initialized(&mut self) {
        if !self.initialized {
            tracing::info!("MCP handshake complete");
        }
        self.initialized = true;
    }
}
