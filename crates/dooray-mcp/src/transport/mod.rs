//! Transports binding the dispatcher and session store to the outside world.
//!
//! One HTTP front end serves all three historical transport flavors; the
//! flavor is a [`TransportKind`] selecting a capability set rather than a
//! separate implementation.

pub mod http;
pub mod stdio;

pub use http::{HttpConfig, MCP_SESSION_ID_HEADER};
pub use stdio::StdioTransport;

/// What an HTTP transport flavor supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCapabilities {
    /// Accepts JSON-RPC messages via POST.
    pub post_json: bool,
    /// Serves a long-lived SSE stream via GET (and SSE-framed POST replies).
    pub sse_stream: bool,
}

/// HTTP transport flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// POST JSON plus GET event stream (MCP streamable HTTP).
    #[default]
    StreamableHttp,
    /// POST JSON only.
    Http,
    /// GET event stream only.
    Sse,
}

impl TransportKind {
    /// The capability set this flavor enables.
    pub fn capabilities(self) -> TransportCapabilities {
        match self {
            TransportKind::StreamableHttp => TransportCapabilities {
                post_json: true,
                sse_stream: true,
            },
            TransportKind::Http => TransportCapabilities {
                post_json: true,
                sse_stream: false,
            },
            TransportKind::Sse => TransportCapabilities {
                post_json: false,
                sse_stream: true,
            },
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streamable-http" => Ok(TransportKind::StreamableHttp),
            "http" => Ok(TransportKind::Http),
            "sse" => Ok(TransportKind::Sse),
            other => Err(format!(
                "Unknown transport: {} (expected streamable-http, http, or sse)",
                other
            )),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportKind::StreamableHttp => "streamable-http",
            TransportKind::Http => "http",
            TransportKind::Sse => "sse",
        };
        f.write_str(s)
    }
}
