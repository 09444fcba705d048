use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors raised while resolving credentials for, or talking to, Google Calendar.
///
/// The display text is the only signal a tool caller ever sees, so every
/// variant reads as a complete sentence.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("No Google account connected. Please connect your Google account first.")]
    NoAccountLinked,

    #[error("No Google access token available. Please connect your Google account.")]
    NoTokenAvailable,

    #[error("Google refresh token was rejected ({0}). Please sign in again to re-authorize Google Calendar.")]
    ReauthRequired(String),

    #[error("Authentication failed: the Google access token is invalid or expired. Please re-authenticate with Google Calendar.")]
    AuthenticationExpired,

    #[error("{0} not found. Please check the calendar ID and event ID.")]
    NotFound(&'static str),

    #[error("Permission denied. You may not have write access to the target calendar.")]
    PermissionDenied,

    #[error("Google Calendar API error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Refreshing the Google access token failed: {0}")]
    RefreshFailed(String),

    #[error("Request to Google failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Credential store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Application-level error type for the HTTP routes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            AppError::Upstream(e) => tracing::warn!("Upstream error: {e}"),
            AppError::Database(e) => tracing::error!("Database error: {e}"),
            AppError::Internal(e) => tracing::error!("Internal error: {e}"),
            _ => {}
        }

        (status, self.to_string()).into_response()
    }
}

/// Convenience type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
