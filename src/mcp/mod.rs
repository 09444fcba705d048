mod auth;
mod handlers;
mod jsonrpc;
mod session;
pub mod tools;
mod transport;

use axum::Router;
use axum::middleware;
use axum::routing::post;
use tower_http::trace::TraceLayer;

pub use transport::McpState;

/// Build the MCP router: the streamable HTTP endpoint behind bearer auth.
pub fn router(state: McpState) -> Router {
    Router::new()
        .route(
            "/mcp",
            post(transport::handle_post)
                .get(transport::handle_get)
                .delete(transport::handle_delete),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
