//! Message dispatcher.
//!
//! Interprets inbound JSON-RPC messages and produces responses. The
//! dispatcher is stateless: all mutable state lives in the session store, so
//! concurrent dispatch for different requests is safe by construction.
//! Handler failures are values (`Result`), converted here into JSON-RPC
//! errors - they never cross a transport boundary as a panic.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::protocol::{
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcMessage, JsonRpcResponse, RequestId,
    ServerCapabilities, ServerInfo, ToolCallParams, ToolCallResult, ToolsCapability,
    ToolsListResult, MCP_VERSION,
};
use crate::registry::ToolRegistry;

/// Stateless dispatcher over a fixed tool registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    info: ServerInfo,
}

impl Dispatcher {
    /// Create a dispatcher for the given registry and server identity.
    pub fn new(registry: Arc<ToolRegistry>, info: ServerInfo) -> Self {
        Self { registry, info }
    }

    /// The advertised server identity.
    pub fn server_info(&self) -> &ServerInfo {
        &self.info
    }

    /// Dispatch one inbound message.
    ///
    /// Returns `None` for notifications - the transport must not send a
    /// reply body for those.
    pub async fn dispatch(&self, msg: JsonRpcMessage) -> Option<JsonRpcResponse> {
        let Some(id) = msg.id else {
            self.handle_notification(&msg.method);
            return None;
        };

        debug!(method = %msg.method, "Dispatching request");

        let response = match msg.method.as_str() {
            "initialize" => self.handle_initialize(id, msg.params),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, msg.params).await,
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            method => {
                warn!(method, "Unknown method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(method))
            }
        };
        Some(response)
    }

    /// Notifications only have side effects.
    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" | "initialized" => {
                info!("Client initialized");
            }
            "notifications/cancelled" => {
                debug!("Request cancelled by client");
            }
            other => {
                debug!(method = other, "Ignoring notification");
            }
        }
    }

    fn handle_initialize(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        if let Some(params) = params {
            match serde_json::from_value::<InitializeParams>(params) {
                Ok(init) => {
                    info!(
                        client = %init.client_info.name,
                        version = %init.client_info.version,
                        protocol = %init.protocol_version,
                        "Client connected"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse initialize params");
                }
            }
        }

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.info.clone(),
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(&e.to_string())),
        }
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.registry.definitions(),
        };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(&e.to_string())),
        }
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, JsonRpcError::invalid_params(&e.to_string()))
                }
            },
            None => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing params"))
            }
        };

        let Some(entry) = self.registry.get(&params.name) else {
            warn!(tool = %params.name, "Tool not found");
            return JsonRpcResponse::error(id, JsonRpcError::tool_not_found(&params.name));
        };

        info!(tool = %params.name, "Calling tool");

        let arguments = params.arguments.unwrap_or_else(|| Value::Object(Default::default()));
        match entry.handler().call(arguments).await {
            Ok(content) => {
                let result = ToolCallResult { content };
                match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => {
                        JsonRpcResponse::error(id, JsonRpcError::internal_error(&e.to_string()))
                    }
                }
            }
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool handler failed");
                JsonRpcResponse::error(id, JsonRpcError::internal_error(&e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ToolContent, JSONRPC_VERSION};
    use dooray_core::Error;
    use serde_json::json;

    fn info() -> ServerInfo {
        ServerInfo {
            name: "dooray-mcp-server".to_string(),
            version: "0.2.1".to_string(),
        }
    }

    fn dispatcher_with(registry: ToolRegistry) -> Dispatcher {
        Dispatcher::new(Arc::new(registry), info())
    }

    fn request(id: i64, method: &str, params: Option<Value>) -> JsonRpcMessage {
        JsonRpcMessage {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(RequestId::Number(id)),
            method: method.to_string(),
            params,
        }
    }

    fn sample_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(
                "echo",
                "Echo the arguments back",
                json!({"type": "object"}),
                |args| async move { Ok(vec![ToolContent::text(args.to_string())]) },
            )
            .unwrap();
        registry
            .register_fn(
                "always_fails",
                "Fails on every call",
                json!({"type": "object"}),
                |_| async move {
                    Err::<Vec<ToolContent>, _>(Error::InvalidData("upstream exploded".into()))
                },
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn initialize_advertises_identity_and_tools() {
        let dispatcher = dispatcher_with(ToolRegistry::new());
        let resp = dispatcher
            .dispatch(request(1, "initialize", None))
            .await
            .unwrap();

        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_VERSION);
        assert_eq!(result["serverInfo"]["name"], "dooray-mcp-server");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn initialize_with_client_info_still_succeeds() {
        let dispatcher = dispatcher_with(ToolRegistry::new());
        let params = json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "1.0.0"}
        });
        let resp = dispatcher
            .dispatch(request(1, "initialize", Some(params)))
            .await
            .unwrap();
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn tools_list_empty_registry() {
        let dispatcher = dispatcher_with(ToolRegistry::new());
        let resp = dispatcher
            .dispatch(request(1, "tools/list", None))
            .await
            .unwrap();
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#);
    }

    #[tokio::test]
    async fn tools_list_is_idempotent_and_ordered() {
        let dispatcher = dispatcher_with(sample_registry());
        let first = dispatcher
            .dispatch(request(1, "tools/list", None))
            .await
            .unwrap();
        let second = dispatcher
            .dispatch(request(1, "tools/list", None))
            .await
            .unwrap();

        let tools = first.result.as_ref().unwrap()["tools"].as_array().unwrap();
        assert_eq!(tools[0]["name"], "echo");
        assert_eq!(tools[1]["name"], "always_fails");
        assert!(tools.iter().all(|t| {
            t["name"].is_string() && t["description"].is_string() && t["inputSchema"].is_object()
        }));
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn tools_call_success_returns_content() {
        let dispatcher = dispatcher_with(sample_registry());
        let resp = dispatcher
            .dispatch(request(
                3,
                "tools/call",
                Some(json!({"name": "echo", "arguments": {"x": 1}})),
            ))
            .await
            .unwrap();

        assert!(resp.error.is_none());
        let content = resp.result.unwrap()["content"].clone();
        assert!(!content.as_array().unwrap().is_empty());
        assert_eq!(content[0]["type"], "text");
    }

    #[tokio::test]
    async fn tools_call_missing_arguments_defaults_to_empty_object() {
        let dispatcher = dispatcher_with(sample_registry());
        let resp = dispatcher
            .dispatch(request(3, "tools/call", Some(json!({"name": "echo"}))))
            .await
            .unwrap();

        let content = resp.result.unwrap()["content"].clone();
        assert_eq!(content[0]["text"], "{}");
    }

    #[tokio::test]
    async fn tools_call_unknown_tool_is_32601() {
        let dispatcher = dispatcher_with(sample_registry());
        let resp = dispatcher
            .dispatch(request(
                2,
                "tools/call",
                Some(json!({"name": "missing", "arguments": {}})),
            ))
            .await
            .unwrap();

        assert!(resp.result.is_none());
        let error = resp.error.unwrap();
        assert_eq!(error.code, JsonRpcError::METHOD_NOT_FOUND);
        assert_eq!(error.message, "Tool not found: missing");
    }

    #[tokio::test]
    async fn tools_call_handler_failure_is_32603() {
        let dispatcher = dispatcher_with(sample_registry());
        let resp = dispatcher
            .dispatch(request(
                4,
                "tools/call",
                Some(json!({"name": "always_fails", "arguments": {}})),
            ))
            .await
            .unwrap();

        assert!(resp.result.is_none());
        let error = resp.error.unwrap();
        assert_eq!(error.code, JsonRpcError::INTERNAL_ERROR);
        assert!(error.message.contains("upstream exploded"));
    }

    #[tokio::test]
    async fn tools_call_without_params_is_invalid_params() {
        let dispatcher = dispatcher_with(sample_registry());
        let resp = dispatcher
            .dispatch(request(5, "tools/call", None))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_method_is_32601() {
        let dispatcher = dispatcher_with(ToolRegistry::new());
        let resp = dispatcher
            .dispatch(request(1, "unknown/method", None))
            .await
            .unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, JsonRpcError::METHOD_NOT_FOUND);
        assert_eq!(error.message, "Method not found: unknown/method");
    }

    #[tokio::test]
    async fn notification_yields_no_response() {
        let dispatcher = dispatcher_with(ToolRegistry::new());
        let msg = JsonRpcMessage {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(dispatcher.dispatch(msg).await.is_none());
    }

    #[tokio::test]
    async fn ping_returns_empty_object() {
        let dispatcher = dispatcher_with(ToolRegistry::new());
        let resp = dispatcher.dispatch(request(9, "ping", None)).await.unwrap();
        assert_eq!(resp.result.unwrap(), json!({}));
    }
}
