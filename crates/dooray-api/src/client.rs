//! Dooray API client implementation.

use async_trait::async_trait;
use dooray_core::{DoorayApi, Error, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// HTTP client for the Dooray REST API.
///
/// Dooray wraps every response in an envelope:
///
/// ```json
/// {"header": {"isSuccessful": true, "resultCode": 0, "resultMessage": ""}, "result": ...}
/// ```
///
/// A non-successful envelope is surfaced as [`Error::Api`] even when the
/// HTTP status is 200.
pub struct DoorayHttpClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl DoorayHttpClient {
    /// Create a new client for the given base URL and API key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Flatten a JSON object into query pairs. Non-object params are ignored.
    fn query_pairs(params: &Value) -> Vec<(String, String)> {
        match params.as_object() {
            Some(map) => map
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect(),
            None => Vec::new(),
        }
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!(status = status_code, message = %message, "Dooray API error response");
            return Err(Error::from_status(status_code, message));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| Error::InvalidData(format!("Failed to parse response: {}", e)))?;

        // Envelope failures come back with HTTP 200.
        if let Some(header) = envelope.get("header") {
            if header.get("isSuccessful").and_then(Value::as_bool) == Some(false) {
                let code = header
                    .get("resultCode")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u16;
                let message = header
                    .get("resultMessage")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string();
                warn!(code, message = %message, "Dooray envelope reported failure");
                return Err(Error::Api {
                    status: code,
                    message,
                });
            }
        }

        Ok(envelope)
    }
}

#[async_trait]
impl DoorayApi for DoorayHttpClient {
    async fn call(
        &self,
        method: &str,
        path: &str,
        params: Option<Value>,
        body: Option<Value>,
    ) -> Result<Value> {
        let method = method
            .parse::<reqwest::Method>()
            .map_err(|_| Error::InvalidData(format!("Invalid HTTP method: {}", method)))?;
        let url = self.url(path);

        debug!(method = %method, url = %url, "Dooray API request");

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("dooray-api {}", self.api_key));

        if let Some(params) = &params {
            request = request.query(&Self::query_pairs(params));
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        self.handle_response(response).await
    }
}
