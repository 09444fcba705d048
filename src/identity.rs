//! The identity/session provider: who is calling, and which Google tokens
//! they have linked. Handed to the MCP layer as an `Arc<dyn IdentityProvider>`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::db::{accounts, tokens};
use crate::error::{AppResult, CalendarError};
use crate::google::OAuthClient;

/// Provider id under which Google accounts are linked.
pub const GOOGLE: &str = "google";

/// Tokens this close to expiry are refreshed before being handed out.
const EXPIRY_SKEW_SECS: i64 = 30;

/// An access token handed out for immediate use.
#[derive(Clone)]
pub struct ProviderToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user behind an MCP bearer token.
    async fn session_user(&self, bearer_token: &str) -> AppResult<Option<String>>;

    /// A currently valid access token for the user's linked provider
    /// account, refreshing it if necessary.
    async fn access_token(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<ProviderToken, CalendarError>;

    /// Forget the user's provider tokens so they must consent again.
    async fn clear_credentials(&self, user_id: &str, provider_id: &str) -> Result<(), CalendarError>;
}

/// SQLite-backed identity provider.
#[derive(Debug, Clone)]
pub struct SqliteIdentityProvider {
    pool: SqlitePool,
    oauth: OAuthClient,
}

impl SqliteIdentityProvider {
    pub fn new(pool: SqlitePool, oauth: OAuthClient) -> Self {
        Self { pool, oauth }
    }
}

#[async_trait]
impl IdentityProvider for SqliteIdentityProvider {
    async fn session_user(&self, bearer_token: &str) -> AppResult<Option<String>> {
        tokens::validate_token(&self.pool, bearer_token).await
    }

    async fn access_token(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<ProviderToken, CalendarError> {
        let account = accounts::get_account(&self.pool, user_id, provider_id)
            .await?
            .ok_or(CalendarError::NoAccountLinked)?;
        let scopes = account.scopes();

        let access_token = account
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(CalendarError::NoTokenAvailable)?;

        let now = Utc::now();
        let stale = account
            .access_token_expires_at
            .is_some_and(|at| at <= now + Duration::seconds(EXPIRY_SKEW_SECS));
        if !stale {
            return Ok(ProviderToken {
                access_token,
                refresh_token: account.refresh_token,
                expires_at: account.access_token_expires_at,
                scopes,
            });
        }

        let refresh_token = account
            .refresh_token
            .ok_or(CalendarError::NoTokenAvailable)?;

        match self.oauth.refresh(&refresh_token).await {
            Ok(fresh) => {
                let expires_at = fresh.expires_at(now);
                accounts::update_tokens(
                    &self.pool,
                    &account.id,
                    accounts::StoredTokens {
                        access_token: &fresh.access_token,
                        refresh_token: fresh.refresh_token.as_deref(),
                        expires_at,
                        scope: fresh.scope.as_deref(),
                    },
                )
                .await?;
                tracing::debug!(user_id, provider_id, "Stored refreshed access token");

                Ok(ProviderToken {
                    access_token: fresh.access_token,
                    refresh_token: fresh.refresh_token.or(Some(refresh_token)),
                    expires_at,
                    scopes,
                })
            }
            Err(err) if err.is_invalid_grant() => {
                tracing::warn!(user_id, provider_id, error = %err, "Refresh token rejected");
                accounts::clear_tokens(&self.pool, user_id, provider_id).await?;
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn clear_credentials(&self, user_id: &str, provider_id: &str) -> Result<(), CalendarError> {
        accounts::clear_tokens(&self.pool, user_id, provider_id).await?;
        Ok(())
    }
}
