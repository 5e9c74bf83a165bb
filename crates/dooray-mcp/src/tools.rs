//! Built-in tool registrations.
//!
//! The server core treats the registry as an input; the only tool shipped
//! here is a generic pass-through that surfaces the upstream REST capability
//! itself. Domain-specific tool suites live with the embedding application.

use std::sync::Arc;

use dooray_core::{DoorayApi, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::protocol::ToolContent;
use crate::registry::ToolRegistry;

#[derive(Debug, Deserialize)]
struct ApiRequestParams {
    #[serde(default = "default_method")]
    method: String,
    path: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Register the generic `dooray_api_request` pass-through tool.
pub fn register_api_tools(
    registry: &mut ToolRegistry,
    client: Arc<dyn DoorayApi>,
) -> Result<()> {
    registry.register_fn(
        "dooray_api_request",
        "Perform a raw Dooray REST API request and return the JSON response",
        json!({
            "type": "object",
            "properties": {
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "PUT", "DELETE"],
                    "description": "HTTP method (default: GET)"
                },
                "path": {
                    "type": "string",
                    "description": "API path relative to the base URL, e.g. /wiki/v1/wikis"
                },
                "params": {
                    "type": "object",
                    "description": "Query string parameters"
                },
                "body": {
                    "type": "object",
                    "description": "JSON request body"
                }
            },
            "required": ["path"]
        }),
        move |arguments| {
            let client = Arc::clone(&client);
            async move {
                let params: ApiRequestParams = serde_json::from_value(arguments)?;
                let response = client
                    .call(&params.method, &params.path, params.params, params.body)
                    .await?;
                let text = serde_json::to_string_pretty(&response)?;
                Ok(vec![ToolContent::text(text)])
            }
        },
    )
}
