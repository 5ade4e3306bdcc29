//! Main request dispatcher - receives JSON-RPC messages, routes to handlers.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::types::*;

use super::negotiation::NegotiatedCapabilities;
use super::registry::HandlerRegistry;

/// The protocol handler that dispatches classified JSON-RPC messages.
///
/// Shared by every transport. Requests always produce exactly one reply;
/// notifications and peer responses never produce one.
pub struct ProtocolHandler {
    registry: Arc<HandlerRegistry>,
    init: InitOptions,
    capabilities: Mutex<NegotiatedCapabilities>,
}

impl ProtocolHandler {
    pub fn new(registry: Arc<HandlerRegistry>, init: InitOptions) -> Self {
        Self {
            registry,
            init,
            capabilities: Mutex::new(NegotiatedCapabilities::default()),
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn init_options(&self) -> &InitOptions {
        &self.init
    }

    pub async fn is_initialized(&self) -> bool {
        self.capabilities.lock().await.initialized
    }

    /// Classify a decoded payload, then dispatch it.
    ///
    /// A payload that cannot be classified is answered with a protocol error
    /// addressed to whatever id can be recovered from it.
    pub async fn handle_payload(&self, payload: &Value) -> Option<JsonRpcMessage> {
        match rpcwire::classify_value(payload) {
            Ok(msg) => self.handle_message(msg).await,
            Err(e) => {
                tracing::warn!("Rejected message: {e}");
                let id = rpcwire::recover_id(payload).unwrap_or_default();
                Some(e.to_message(id))
            }
        }
    }

    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match msg {
            JsonRpcMessage::Request { id, method, params } => {
                Some(self.handle_request(id, method, params).await)
            }
            JsonRpcMessage::Notification { method, params } => {
                self.handle_notification(method, params).await;
                None
            }
            JsonRpcMessage::Response { id, .. } => {
                tracing::debug!("Ignoring response {id} from client");
                None
            }
            JsonRpcMessage::Error { id, error } => {
                tracing::warn!(
                    "Client reported error for {id}: {} ({})",
                    error.message,
                    error.code
                );
                None
            }
        }
    }

    async fn handle_request(
        &self,
        id: RequestId,
        method: String,
        params: Option<Params>,
    ) -> JsonRpcMessage {
        tracing::debug!("Handling request {id}: {method}");

        match self.dispatch_request(&method, params).await {
            Ok(Value::Object(result)) => JsonRpcMessage::response(id, result),
            Ok(other) => McpError::InternalError(format!(
                "{method} returned a non-object result: {other}"
            ))
            .to_error_message(id),
            Err(e) => {
                tracing::debug!("Request {id} ({method}) failed: {e}");
                e.to_error_message(id)
            }
        }
    }

    async fn dispatch_request(&self, method: &str, params: Option<Params>) -> McpResult<Value> {
        match method {
            "initialize" => self.handle_initialize(params).await,
            "ping" => Ok(Value::Object(Map::new())),
            _ => self.invoke(method, params).await,
        }
    }

    async fn handle_notification(&self, method: String, params: Option<Params>) {
        match method.as_str() {
            "notifications/initialized" | "initialized" => {
                self.capabilities.lock().await.mark_initialized();
            }
            "notifications/cancelled" => {
                let reason = params
                    .as_ref()
                    .and_then(|p| p.parse::<CancelledParams>().ok())
                    .and_then(|p| p.reason);
                tracing::info!(
                    "Received cancellation notification: {}",
                    reason.as_deref().unwrap_or("no reason given")
                );
            }
            _ if self.registry.contains(&method) => {
                // Result is discarded: notifications never get a reply.
                if let Err(e) = self.invoke(&method, params).await {
                    tracing::warn!("Notification handler for {method} failed: {e}");
                }
            }
            _ => {
                tracing::debug!("Unknown notification: {method}");
            }
        }
    }

    /// Run the registered handler for `method`, converting a panic inside the
    /// handler into an internal error.
    async fn invoke(&self, method: &str, params: Option<Params>) -> McpResult<Value> {
        let handler = self
            .registry
            .get(method)
            .ok_or_else(|| McpError::MethodNotFound(method.to_string()))?;

        match AssertUnwindSafe(handler(params)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!("Handler for {method} panicked: {reason}");
                Err(McpError::InternalError(format!(
                    "handler for {method} panicked: {reason}"
                )))
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Params>) -> McpResult<Value> {
        let init_params: InitializeParams = params
            .ok_or_else(|| McpError::InvalidParams("Initialize params required".to_string()))?
            .parse()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        let result = self
            .capabilities
            .lock()
            .await
            .negotiate(init_params, &self.init);

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
