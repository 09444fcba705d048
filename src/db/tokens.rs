use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::McpToken;
use crate::error::{AppError, AppResult};

const TOKEN_SCHEME: &str = "gcal_";
const PREFIX_LEN: usize = 8;

/// Mint a bearer token for a user. Returns the raw token (only shown once)
/// and the stored record.
pub async fn create_token(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
) -> AppResult<(String, McpToken)> {
    let id = Uuid::now_v7().to_string();
    let raw_token = generate_raw_token();
    let prefix = token_prefix(&raw_token)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Generated token is malformed")))?;
    let token_hash = hash_token(&raw_token)?;

    sqlx::query(
        "INSERT INTO mcp_tokens (id, user_id, token_prefix, token_hash, name) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(prefix)
    .bind(&token_hash)
    .bind(name)
    .execute(pool)
    .await?;

    let record = sqlx::query_as::<_, McpToken>("SELECT * FROM mcp_tokens WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;

    Ok((raw_token, record))
}

/// Validate a raw bearer token and return the owning user ID if it is live.
///
/// Only tokens sharing the cleartext prefix are hash-checked.
pub async fn validate_token(pool: &SqlitePool, raw_token: &str) -> AppResult<Option<String>> {
    let Some(prefix) = token_prefix(raw_token) else {
        return Ok(None);
    };

    let candidates =
        sqlx::query_as::<_, McpToken>("SELECT * FROM mcp_tokens WHERE token_prefix = ?")
            .bind(prefix)
            .fetch_all(pool)
            .await?;

    let now = Utc::now();
    for token in candidates.into_iter().filter(|t| !t.is_expired(now)) {
        if verify_token(raw_token, &token.token_hash)? {
            sqlx::query("UPDATE mcp_tokens SET last_used_at = ? WHERE id = ?")
                .bind(now)
                .bind(&token.id)
                .execute(pool)
                .await?;
            return Ok(Some(token.user_id));
        }
    }

    Ok(None)
}

/// Delete a bearer token by ID.
pub async fn delete_token(pool: &SqlitePool, token_id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM mcp_tokens WHERE id = ?")
        .bind(token_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Token not found".to_string()));
    }
    Ok(())
}

/// List all tokens for a user (without raw values).
pub async fn list_tokens_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<McpToken>> {
    let tokens = sqlx::query_as::<_, McpToken>(
        "SELECT * FROM mcp_tokens WHERE user_id = ? ORDER BY created_at, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(tokens)
}

fn generate_raw_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    format!(
        "{TOKEN_SCHEME}{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    )
}

/// The lookup prefix: the first characters after the scheme marker.
fn token_prefix(raw: &str) -> Option<&str> {
    let body = raw.strip_prefix(TOKEN_SCHEME)?;
    body.get(..PREFIX_LEN)
}

fn hash_token(token: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(token.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Token hashing failed: {e}")))?;
    Ok(hash.to_string())
}

fn verify_token(token: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid token hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(token.as_bytes(), &parsed)
        .is_ok())
}
