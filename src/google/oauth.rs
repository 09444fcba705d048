use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::config::GoogleConfig;
use crate::error::CalendarError;

/// Scopes requested at sign-in. Calendar access needs the full calendar scope.
pub const SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/calendar",
];

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The grant (refresh token or authorization code) is no longer usable.
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    #[error("token endpoint returned {status}: {error}")]
    Rejected { status: u16, error: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl OAuthError {
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self, OAuthError::InvalidGrant(_))
    }
}

impl From<OAuthError> for CalendarError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::InvalidGrant(reason) => CalendarError::ReauthRequired(reason),
            OAuthError::Rejected { status, error } => {
                CalendarError::RefreshFailed(format!("token endpoint returned {status}: {error}"))
            }
            OAuthError::Http(e) => CalendarError::Http(e),
        }
    }
}

/// A successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in.map(|secs| now + Duration::seconds(secs))
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// The OpenID Connect userinfo claims used to identify a user.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Client for Google's OAuth 2.0 endpoints.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: GoogleConfig,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, config: &GoogleConfig) -> Self {
        Self {
            http,
            config: config.clone(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// The consent URL a browser is sent to. Offline access so Google issues
    /// a refresh token; consent forced so it does so on every link.
    pub fn authorize_url(&self, state: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.config.auth_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "select_account consent")
            .append_pair("state", state);
        Ok(url)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OAuthError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    /// Exchange a refresh token for a new access token. One attempt only.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthError> {
        tracing::debug!("Refreshing Google access token");
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    pub async fn user_info(&self, access_token: &str) -> Result<UserInfo, OAuthError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Rejected {
                status: status.as_u16(),
                error: body,
            });
        }
        Ok(response.json().await?)
    }

    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<TokenResponse, OAuthError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_token_error(status, &body))
    }
}

/// `invalid_grant`, or any 400 from the token endpoint, means the grant itself
/// is dead and retrying cannot help.
fn classify_token_error(status: StatusCode, body: &str) -> OAuthError {
    let parsed: Option<TokenErrorBody> = serde_json::from_str(body).ok();
    let (error, description) = match parsed {
        Some(e) => (e.error, e.error_description),
        None => (body.trim().to_string(), None),
    };

    if error == "invalid_grant" || status == StatusCode::BAD_REQUEST {
        let reason = match description {
            Some(d) => format!("{error}: {d}"),
            None => error,
        };
        return OAuthError::InvalidGrant(reason);
    }

    OAuthError::Rejected {
        status: status.as_u16(),
        error,
    }
}
