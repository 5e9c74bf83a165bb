//! MCP (Model Context Protocol) server core for dooray-tools.
//!
//! Exposes a tool registry over MCP through three transports: stdio,
//! streamable HTTP, and SSE. The HTTP transports share one implementation
//! selected by capability set; sessions correlate POST requests with their
//! GET event stream and are evicted eagerly on disconnect or by an idle
//! sweep.

pub mod dispatch;
pub mod origin;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;

pub use dispatch::Dispatcher;
pub use registry::{ToolHandler, ToolRegistry};
pub use server::McpServer;
pub use session::SessionStore;
pub use transport::{HttpConfig, TransportKind};
