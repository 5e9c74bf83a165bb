//! Upstream API capability.
//!
//! Tool handlers never talk to Dooray directly; they go through this trait so
//! the transport/session core can be exercised without a network.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Capability for calling the wrapped Dooray REST API.
///
/// `method` is an HTTP verb (`GET`, `POST`, ...), `path` is relative to the
/// configured base URL (e.g. `/wiki/v1/wikis`), `params` become the query
/// string, `body` the JSON request body. The response is the parsed JSON
/// document returned by the API.
#[async_trait]
pub trait DoorayApi: Send + Sync {
    async fn call(
        &self,
        method: &str,
        path: &str,
        params: Option<Value>,
        body: Option<Value>,
    ) -> Result<Value>;
}
