use std::sync::Arc;
use std::time::Duration;

use axum::Extension;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use super::auth::McpUserId;
use super::handlers;
use super::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use super::session::SessionManager;
use super::tools::ToolRegistry;
use crate::identity::IdentityProvider;

pub const SESSION_HEADER: &str = "mcp-session-id";

/// Shared state for the MCP endpoint.
#[derive(Clone)]
pub struct McpState {
    pub identity: Arc<dyn IdentityProvider>,
    pub registry: Arc<ToolRegistry>,
    pub sessions: SessionManager,
    pub max_duration: Duration,
    pub base_url: String,
}

impl McpState {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        registry: Arc<ToolRegistry>,
        max_duration: Duration,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            registry,
            sessions: SessionManager::new(),
            max_duration,
            base_url: base_url.into(),
        }
    }
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

/// Handle POST /mcp: one JSON-RPC message from the client.
pub async fn handle_post(
    State(state): State<McpState>,
    Extension(McpUserId(user_id)): Extension<McpUserId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return Json(JsonRpcResponse::parse_error(e)).into_response(),
    };
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(req) => req,
        Err(e) => return Json(JsonRpcResponse::invalid_request(None, e)).into_response(),
    };
    if request.jsonrpc != "2.0" {
        let resp = JsonRpcResponse::invalid_request(request.id, "jsonrpc must be \"2.0\"");
        return Json(resp).into_response();
    }

    let initializing = request.method == "initialize";
    if !initializing
        && let Some(sid) = session_id(&headers)
        && !state.sessions.is_owned_by(sid, &user_id)
    {
        return (StatusCode::NOT_FOUND, "Session not found").into_response();
    }

    let handled = tokio::time::timeout(
        state.max_duration,
        handlers::handle_request(&state.registry, &user_id, &request),
    )
    .await;

    let reply = match handled {
        Ok(Some(reply)) => reply,
        Ok(None) => return StatusCode::ACCEPTED.into_response(),
        Err(_) => {
            tracing::warn!(
                method = %request.method,
                user_id = %user_id,
                limit_secs = state.max_duration.as_secs(),
                "MCP request timed out"
            );
            JsonRpcResponse::internal_error(request.id, "Request exceeded the maximum execution time")
        }
    };

    let mut response = Json(reply).into_response();
    if initializing {
        let sid = state.sessions.create_session(&user_id);
        tracing::debug!(user_id = %user_id, session_id = %sid, "MCP session opened");
        if let Ok(value) = HeaderValue::from_str(&sid) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(SESSION_HEADER), value);
        }
    }
    response
}

/// Handle GET /mcp. No server-initiated stream is offered.
pub async fn handle_get() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, DELETE")],
        "Server-initiated streams are not supported",
    )
        .into_response()
}

/// Handle DELETE /mcp: terminate a session.
pub async fn handle_delete(
    State(state): State<McpState>,
    Extension(McpUserId(user_id)): Extension<McpUserId>,
    headers: HeaderMap,
) -> Response {
    let Some(sid) = session_id(&headers) else {
        return (StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header").into_response();
    };

    if state.sessions.remove_session(sid, &user_id) {
        tracing::debug!(user_id = %user_id, session_id = sid, "MCP session closed");
        (StatusCode::OK, "Session terminated").into_response()
    } else {
        (StatusCode::NOT_FOUND, "Session not found").into_response()
    }
}
