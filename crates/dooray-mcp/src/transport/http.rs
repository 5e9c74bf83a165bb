//! HTTP front end: streamable HTTP and SSE in one configurable transport.
//!
//! ## Endpoints
//!
//! - `POST {path}` - one JSON-RPC message per request; replies as JSON or as
//!   a single SSE record when the client accepts `text/event-stream`
//!   (capability `post_json`)
//! - `GET {path}` - long-lived SSE stream scoped to a session: connection
//!   event, pending-queue drain, periodic heartbeats (capability
//!   `sse_stream`)
//! - `GET /health` - static liveness payload, not session-scoped
//!
//! Every request is origin-checked and resolves a session; the session id is
//! echoed in the `Mcp-Session-Id` response header. A session dies with its
//! stream; an idle sweep covers sessions that never opened one.
//!
//! `Last-Event-ID` is accepted but there is no replay buffer: a reconnecting
//! client continues from a fresh point. Known limitation.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use dooray_core::{Error, Result};
use futures::stream::Stream;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{TransportCapabilities, TransportKind};
use crate::dispatch::Dispatcher;
use crate::origin;
use crate::protocol::JsonRpcMessage;
use crate::session::{SessionGuard, SessionStore};

/// Header carrying the session id in both directions.
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

/// Header for best-effort stream resumption.
pub const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// MCP endpoint path.
    pub path: String,
    /// Transport flavor (capability set).
    pub kind: TransportKind,
    /// Interval between heartbeat events on an idle stream.
    pub heartbeat_interval: Duration,
    /// Polling interval for the pending-message queue.
    pub drain_poll_interval: Duration,
    /// Sessions idle longer than this are evicted.
    pub session_max_idle: Duration,
    /// How often the idle sweep runs.
    pub sweep_interval: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            path: "/mcp".to_string(),
            kind: TransportKind::default(),
            heartbeat_interval: Duration::from_secs(30),
            drain_poll_interval: Duration::from_secs(1),
            session_max_idle: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Shared state for the HTTP handlers.
#[derive(Clone)]
struct HttpState {
    dispatcher: Arc<Dispatcher>,
    sessions: SessionStore,
    caps: TransportCapabilities,
    heartbeat_interval: Duration,
    drain_poll_interval: Duration,
}

/// Build the axum router for the configured transport flavor.
pub fn router(config: &HttpConfig, dispatcher: Arc<Dispatcher>, sessions: SessionStore) -> Router {
    let caps = config.kind.capabilities();
    let state = HttpState {
        dispatcher,
        sessions,
        caps,
        heartbeat_interval: config.heartbeat_interval,
        drain_poll_interval: config.drain_poll_interval,
    };

    let mcp_routes = match (caps.post_json, caps.sse_stream) {
        (true, true) => post(mcp_post).get(mcp_get),
        (true, false) => post(mcp_post),
        // `(false, false)` is unreachable: every TransportKind enables at
        // least one capability.
        _ => get(mcp_get),
    };

    Router::new()
        .route(&config.path, mcp_routes)
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until the process stops.
pub async fn serve(
    config: HttpConfig,
    dispatcher: Arc<Dispatcher>,
    sessions: SessionStore,
) -> Result<()> {
    let sweep = sessions.spawn_idle_sweep(config.session_max_idle, config.sweep_interval);
    let addr = format!("{}:{}", config.host, config.port);
    let app = router(&config, dispatcher, sessions);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind {}: {}", addr, e)))?;

    info!(addr = %addr, path = %config.path, kind = %config.kind, "MCP HTTP server listening");

    let result = axum::serve(listener, app)
        .await
        .map_err(|e| Error::Http(e.to_string()));
    sweep.abort();
    result
}

/// GET /health - static liveness payload.
async fn health(State(state): State<HttpState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "server": state.dispatcher.server_info().name.clone(),
    }))
}

/// POST {path} - handle one JSON-RPC message.
async fn mcp_post(State(state): State<HttpState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(rejection) = check_origin(&headers) {
        return rejection;
    }

    let session_id = state.sessions.get_or_create(session_header(&headers).as_deref());

    let message: JsonRpcMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Malformed request body");
            let response = (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid JSON"})),
            )
                .into_response();
            return with_session_header(response, &session_id);
        }
    };

    debug!(session_id = %session_id, method = %message.method, "POST message");

    let response = match state.dispatcher.dispatch(message).await {
        // Notification: accepted, no reply owed.
        None => StatusCode::ACCEPTED.into_response(),
        Some(reply) => {
            if state.caps.sse_stream && accepts_event_stream(&headers) {
                sse_framed_response(&reply)
            } else {
                let body = serde_json::to_string(&reply).unwrap_or_default();
                let mut response = (StatusCode::OK, body).into_response();
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response
            }
        }
    };

    with_session_header(response, &session_id)
}

/// GET {path} - open the session's event stream.
async fn mcp_get(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    if let Some(rejection) = check_origin(&headers) {
        return rejection;
    }

    let session_id = state.sessions.get_or_create(session_header(&headers).as_deref());

    if let Some(last_event_id) = headers
        .get(LAST_EVENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        // No replay buffer; the stream restarts from a fresh point.
        debug!(session_id = %session_id, last_event_id, "Client asked to resume stream");
    }

    info!(session_id = %session_id, "SSE stream opened");

    let guard = state.sessions.guard(session_id.clone());
    let frames = session_frames(
        state.sessions.clone(),
        guard,
        state.heartbeat_interval,
        state.drain_poll_interval,
    );
    let events = frames.map(|frame| {
        Ok::<_, Infallible>(
            Event::default()
                .id(Uuid::new_v4().to_string())
                .event(frame.event)
                .data(frame.data.to_string()),
        )
    });

    let mut response = Sse::new(events).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    response.headers_mut().insert(
        header::CONNECTION,
        HeaderValue::from_static("keep-alive"),
    );
    with_session_header(response, &session_id)
}

/// One record on the event stream, before SSE encoding.
#[derive(Debug, Clone, PartialEq)]
struct SseFrame {
    event: &'static str,
    data: Value,
}

struct FrameState {
    sessions: SessionStore,
    guard: SessionGuard,
    ready: VecDeque<SseFrame>,
    sent_connected: bool,
    last_heartbeat: Instant,
    heartbeat_interval: Duration,
    drain_poll_interval: Duration,
}

/// Generate the per-session stream: connection event first, then pending
/// messages in FIFO order interleaved with heartbeats while idle. Ends when
/// the session disappears from the store; dropping the stream removes the
/// session via its guard.
fn session_frames(
    sessions: SessionStore,
    guard: SessionGuard,
    heartbeat_interval: Duration,
    drain_poll_interval: Duration,
) -> impl Stream<Item = SseFrame> {
    let state = FrameState {
        sessions,
        guard,
        ready: VecDeque::new(),
        sent_connected: false,
        last_heartbeat: Instant::now(),
        heartbeat_interval,
        drain_poll_interval,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.ready.pop_front() {
                return Some((frame, st));
            }

            if !st.sent_connected {
                st.sent_connected = true;
                st.ready.push_back(SseFrame {
                    event: "message",
                    data: json!({
                        "jsonrpc": "2.0",
                        "method": "notifications/connection",
                        "params": {
                            "type": "connection_established",
                            "sessionId": st.guard.id(),
                        }
                    }),
                });
                continue;
            }

            // Evicted by the idle sweep or removed elsewhere: end the stream.
            if !st.sessions.contains(st.guard.id()) {
                return None;
            }

            let pending = st.sessions.drain_pending(st.guard.id());
            if !pending.is_empty() {
                st.ready.extend(pending.into_iter().map(|data| SseFrame {
                    event: "message",
                    data,
                }));
                continue;
            }

            if st.last_heartbeat.elapsed() >= st.heartbeat_interval {
                st.last_heartbeat = Instant::now();
                st.ready.push_back(SseFrame {
                    event: "heartbeat",
                    data: json!({
                        "type": "heartbeat",
                        "timestamp": unix_timestamp(),
                    }),
                });
                continue;
            }

            tokio::time::sleep(st.drain_poll_interval).await;
        }
    })
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Frame a single JSON-RPC reply as one SSE record.
fn sse_framed_response(reply: &crate::protocol::JsonRpcResponse) -> Response {
    let data = serde_json::to_string(reply).unwrap_or_default();
    let body = format!(
        "id: {}\nevent: message\ndata: {}\n\n",
        Uuid::new_v4(),
        data
    );

    let mut response = (StatusCode::OK, Body::from(body)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    response
}

/// Reject disallowed origins before touching the session store.
fn check_origin(headers: &HeaderMap) -> Option<Response> {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if origin::is_allowed(origin) {
        None
    } else {
        warn!(origin = origin.unwrap_or("<unreadable>"), "Rejecting request origin");
        Some(
            (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "Invalid origin"})),
            )
                .into_response(),
        )
    }
}

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn with_session_header(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(MCP_SESSION_ID_HEADER), value);
    }
    response
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/event-stream"))
        .unwrap_or(false)
}
