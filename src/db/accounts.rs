use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::Account;

/// Token fields written to an account row after a code exchange or refresh.
#[derive(Debug, Clone, Copy)]
pub struct StoredTokens<'a> {
    pub access_token: &'a str,
    /// `None` keeps the refresh token already on file; Google omits it on refresh.
    pub refresh_token: Option<&'a str>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<&'a str>,
}

/// Link (or relink) a provider account to a user and store its tokens.
pub async fn upsert_account(
    pool: &SqlitePool,
    user_id: &str,
    provider_id: &str,
    account_id: &str,
    tokens: StoredTokens<'_>,
) -> Result<Account, sqlx::Error> {
    let id = Uuid::now_v7().to_string();

    sqlx::query(
        "INSERT INTO accounts
            (id, user_id, provider_id, account_id, access_token, refresh_token,
             access_token_expires_at, scope)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(user_id, provider_id) DO UPDATE SET
            account_id = excluded.account_id,
            access_token = excluded.access_token,
            refresh_token = COALESCE(excluded.refresh_token, accounts.refresh_token),
            access_token_expires_at = excluded.access_token_expires_at,
            scope = COALESCE(excluded.scope, accounts.scope),
            updated_at = CURRENT_TIMESTAMP",
    )
    .bind(&id)
    .bind(user_id)
    .bind(provider_id)
    .bind(account_id)
    .bind(tokens.access_token)
    .bind(tokens.refresh_token)
    .bind(tokens.expires_at)
    .bind(tokens.scope)
    .execute(pool)
    .await?;

    get_account(pool, user_id, provider_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Fetch the account a user linked for the given provider.
pub async fn get_account(
    pool: &SqlitePool,
    user_id: &str,
    provider_id: &str,
) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE user_id = ? AND provider_id = ?")
        .bind(user_id)
        .bind(provider_id)
        .fetch_optional(pool)
        .await
}

/// Store a refreshed access token on an existing account.
pub async fn update_tokens(
    pool: &SqlitePool,
    account_id: &str,
    tokens: StoredTokens<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE accounts SET
            access_token = ?,
            refresh_token = COALESCE(?, refresh_token),
            access_token_expires_at = ?,
            scope = COALESCE(?, scope),
            updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(tokens.access_token)
    .bind(tokens.refresh_token)
    .bind(tokens.expires_at)
    .bind(tokens.scope)
    .bind(account_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Wipe stored tokens so the user must go through consent again.
/// Returns whether an account was affected.
pub async fn clear_tokens(
    pool: &SqlitePool,
    user_id: &str,
    provider_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE accounts SET
            access_token = NULL,
            refresh_token = NULL,
            access_token_expires_at = NULL,
            updated_at = CURRENT_TIMESTAMP
         WHERE user_id = ? AND provider_id = ?",
    )
    .bind(user_id)
    .bind(provider_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
