use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user who has signed in with Google.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: NaiveDateTime,
}

/// An identity provider account linked to a user, holding its OAuth tokens.
/// Looked up by `(user_id, provider_id)`, so those columns are not carried.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    /// The provider's subject id for the user.
    pub account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Summary for operator listings.
    pub fn link_status(&self) -> String {
        if self.access_token.is_some() {
            format!(
                "linked as {} (updated {})",
                self.account_id,
                self.updated_at.format("%Y-%m-%d %H:%M")
            )
        } else {
            format!("{} needs sign-in", self.account_id)
        }
    }

    /// Granted scopes, split from the space-delimited form Google returns.
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// An MCP bearer token for assistant clients.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct McpToken {
    pub id: String,
    pub user_id: String,
    pub token_prefix: String,
    pub token_hash: String,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl McpToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}
