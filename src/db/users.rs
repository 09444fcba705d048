use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::User;
use crate::error::{AppError, AppResult};

/// Insert a user for this email, or refresh the display name of the existing one.
pub async fn upsert_user(pool: &SqlitePool, email: &str, name: Option<&str>) -> AppResult<User> {
    let id = Uuid::now_v7().to_string();

    sqlx::query(
        "INSERT INTO users (id, email, name) VALUES (?, ?, ?)
         ON CONFLICT(email) DO UPDATE SET name = COALESCE(excluded.name, users.name)",
    )
    .bind(&id)
    .bind(email)
    .bind(name)
    .execute(pool)
    .await?;

    get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("User upserted but not found")))
}

/// Look up a user by email address.
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn list_users(pool: &SqlitePool) -> AppResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY email")
        .fetch_all(pool)
        .await?;
    Ok(users)
}
