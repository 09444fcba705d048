use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use headers::authorization::Bearer;
use headers::{Authorization, HeaderMapExt};

use super::transport::McpState;

/// Wrapper for the authenticated MCP user's ID.
#[derive(Debug, Clone)]
pub struct McpUserId(pub String);

/// Middleware to require Bearer token authentication for MCP requests.
/// On success, inserts the user id into request extensions.
pub async fn require_bearer_auth(
    State(state): State<McpState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| unauthorized(&state, "Missing or malformed bearer token"))?;

    let user_id = match state.identity.session_user(bearer.token()).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return Err(unauthorized(&state, "Invalid or expired token")),
        Err(err) => {
            tracing::warn!(error = %err, "Bearer token lookup failed");
            return Err(unauthorized(&state, "Token validation failed"));
        }
    };

    request.extensions_mut().insert(McpUserId(user_id));
    Ok(next.run(request).await)
}

/// 401 pointing the client at the protected-resource metadata, where it
/// discovers how to obtain a token.
fn unauthorized(state: &McpState, msg: &'static str) -> Response {
    let challenge = format!(
        "Bearer resource_metadata=\"{}/.well-known/oauth-protected-resource\"",
        state.base_url
    );
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        msg,
    )
        .into_response()
}
