//! Browser-facing routes: linking a Google account and discovering how to
//! authenticate against `/mcp`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::{accounts, tokens, users};
use crate::error::{AppError, AppResult};
use crate::google::OAuthClient;
use crate::google::oauth::SCOPES;
use crate::identity::GOOGLE;

/// How long a `/login` state value stays redeemable.
const LOGIN_STATE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone)]
pub struct WebState {
    pub pool: SqlitePool,
    pub oauth: OAuthClient,
    pub base_url: String,
    pending: Arc<Mutex<HashMap<String, Instant>>>,
}

impl WebState {
    pub fn new(pool: SqlitePool, oauth: OAuthClient, base_url: impl Into<String>) -> Self {
        Self {
            pool,
            oauth,
            base_url: base_url.into(),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue_state(&self) -> String {
        let mut bytes = [0u8; 24];
        OsRng.fill_bytes(&mut bytes);
        let state = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);

        let now = Instant::now();
        let mut pending = self.pending();
        pending.retain(|_, issued| now.duration_since(*issued) < LOGIN_STATE_TTL);
        pending.insert(state.clone(), now);
        state
    }

    /// One-time: a state value is consumed whether or not it is still fresh.
    fn redeem_state(&self, state: &str) -> bool {
        self.pending()
            .remove(state)
            .is_some_and(|issued| issued.elapsed() < LOGIN_STATE_TTL)
    }
}

pub fn router(state: WebState) -> Router {
    let metadata = Router::new()
        .route(
            "/.well-known/oauth-protected-resource",
            get(protected_resource_metadata),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers(Any),
        );

    Router::new()
        .route("/login", get(login))
        .route("/api/auth/callback/google", get(google_callback))
        .merge(metadata)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// RFC 9728 protected resource metadata for the MCP endpoint.
///
/// No `authorization_servers` are listed: this server is not an OAuth
/// authorization server. Bearer tokens are minted by signing in at `/login`
/// (or with the `create-token` command), which `resource_documentation`
/// points at.
async fn protected_resource_metadata(State(state): State<WebState>) -> Json<Value> {
    Json(json!({
        "resource": format!("{}/mcp", state.base_url),
        "resource_name": "Google Calendar MCP",
        "resource_documentation": format!("{}/login", state.base_url),
        "bearer_methods_supported": ["header"],
        "scopes_supported": SCOPES,
    }))
}

async fn login(State(state): State<WebState>) -> AppResult<Redirect> {
    let login_state = state.issue_state();
    let url = state
        .oauth
        .authorize_url(&login_state)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid Google authorization URL: {e}")))?;
    Ok(Redirect::to(url.as_str()))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn google_callback(
    State(state): State<WebState>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Response> {
    if let Some(error) = params.error {
        return Err(AppError::BadRequest(format!("Google sign-in failed: {error}")));
    }
    let login_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state".to_string()))?;
    if !state.redeem_state(&login_state) {
        return Err(AppError::BadRequest("Unknown or expired login state".to_string()));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let grant = state
        .oauth
        .exchange_code(&code)
        .await
        .map_err(|e| AppError::Upstream(format!("Code exchange failed: {e}")))?;
    let profile = state
        .oauth
        .user_info(&grant.access_token)
        .await
        .map_err(|e| AppError::Upstream(format!("Fetching Google profile failed: {e}")))?;

    let user = users::upsert_user(&state.pool, &profile.email, profile.name.as_deref()).await?;
    accounts::upsert_account(
        &state.pool,
        &user.id,
        GOOGLE,
        &profile.sub,
        accounts::StoredTokens {
            access_token: &grant.access_token,
            refresh_token: grant.refresh_token.as_deref(),
            expires_at: grant.expires_at(Utc::now()),
            scope: grant.scope.as_deref(),
        },
    )
    .await?;

    let (token, record) = tokens::create_token(&state.pool, &user.id, "Google sign-in").await?;
    tracing::info!(user_id = %user.id, email = %user.email, token_id = %record.id, "Google account linked");

    Ok(Json(json!({
        "email": user.email,
        "token": token,
        "token_type": "Bearer",
        "mcp_endpoint": format!("{}/mcp", state.base_url),
    }))
    .into_response())
}
