//! Server wiring: registry + dispatcher + session store + transport.

use std::sync::Arc;

use axum::Router;
use dooray_core::Result;
use tracing::{error, info};

use crate::dispatch::Dispatcher;
use crate::protocol::{JsonRpcError, JsonRpcResponse, RequestId, ServerInfo};
use crate::registry::ToolRegistry;
use crate::session::SessionStore;
use crate::transport::{HttpConfig, StdioTransport};

/// MCP server over a fixed tool registry.
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    sessions: SessionStore,
}

impl McpServer {
    /// Create a server for the given registry and identity.
    pub fn new(registry: Arc<ToolRegistry>, info: ServerInfo) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(registry, info)),
            sessions: SessionStore::new(),
        }
    }

    /// The server's dispatcher.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// The server's session store.
    pub fn sessions(&self) -> SessionStore {
        self.sessions.clone()
    }

    /// Build the HTTP router without binding (used by tests).
    pub fn router(&self, config: &HttpConfig) -> Router {
        crate::transport::http::router(config, self.dispatcher(), self.sessions())
    }

    /// Serve over HTTP until the process stops.
    pub async fn serve_http(&self, config: HttpConfig) -> Result<()> {
        crate::transport::http::serve(config, self.dispatcher(), self.sessions()).await
    }

    /// Run the stdio main loop until EOF.
    pub async fn run_stdio(&self) -> Result<()> {
        info!("Starting MCP stdio server");

        let mut transport = StdioTransport::stdio();

        loop {
            match transport.read_message() {
                Ok(Some(message)) => {
                    if let Some(response) = self.dispatcher.dispatch(message).await {
                        if let Err(e) = transport.write_response(&response) {
                            error!("Failed to write response: {}", e);
                            break;
                        }
                    }
                }
                Ok(None) => {
                    info!("EOF received, shutting down");
                    break;
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    let error_resp = JsonRpcResponse::error(
                        RequestId::Null,
                        JsonRpcError::parse_error(&e.to_string()),
                    );
                    let _ = transport.write_response(&error_resp);
                }
            }
        }

        info!("MCP stdio server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server() -> McpServer {
        McpServer::new(
            Arc::new(ToolRegistry::new()),
            ServerInfo {
                name: "dooray-mcp-server".to_string(),
                version: "0.2.1".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn dispatcher_is_shared() {
        let server = server();
        let dispatcher = server.dispatcher();

        let msg = crate::protocol::JsonRpcMessage {
            jsonrpc: "2.0".to_string(),
            id: Some(RequestId::Number(1)),
            method: "tools/list".to_string(),
            params: None,
        };
        let resp = dispatcher.dispatch(msg).await.unwrap();
        assert_eq!(resp.result.unwrap(), json!({"tools": []}));
    }

    #[test]
    fn sessions_are_shared() {
        let server = server();
        let a = server.sessions();
        let b = server.sessions();
        let id = a.get_or_create(None);
        assert!(b.contains(&id));
    }
}
