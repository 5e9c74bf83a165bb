//! Tool registry.
//!
//! The registry is constructed once at startup and handed to the dispatcher
//! by `Arc`; it is never mutated while the server runs. Lookup is by exact
//! name, listing preserves registration order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dooray_core::{Error, Result};
use serde_json::Value;

use crate::protocol::{ToolContent, ToolDefinition};

/// A tool's execution capability.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool with the given arguments (always a JSON object,
    /// possibly empty).
    async fn call(&self, arguments: Value) -> Result<Vec<ToolContent>>;
}

/// Adapter so plain async functions/closures can act as handlers.
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<ToolContent>>> + Send,
{
    async fn call(&self, arguments: Value) -> Result<Vec<ToolContent>> {
        (self.0)(arguments).await
    }
}

/// A registered tool.
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    handler: Arc<dyn ToolHandler>,
}

impl ToolEntry {
    /// The tool's `tools/list` representation.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }

    /// The tool's handler.
    pub fn handler(&self) -> Arc<dyn ToolHandler> {
        Arc::clone(&self.handler)
    }
}

/// Registry of tools exposed over MCP.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(Error::InvalidData(format!(
                "Tool already registered: {}",
                name
            )));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(ToolEntry {
            name,
            description: description.into(),
            input_schema,
            handler,
        });
        Ok(())
    }

    /// Register an async function or closure as a tool.
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        f: F,
    ) -> Result<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<ToolContent>>> + Send + 'static,
    {
        self.register(name, description, input_schema, Arc::new(FnHandler(f)))
    }

    /// Look up a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// All tool definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(ToolEntry::definition).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
