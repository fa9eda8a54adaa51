
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const USER_COLUMNS: &str = "id, first_name, last_name, email, password, is_active, is_verified, \
     verified_at, registered_at, updated_at, created_at";

pub struct UserQueries;

impl UserQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_user: NewUser) -> Result<User> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO users (first_name, last_name, email, password, is_active, is_verified, registered_at, updated_at, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.is_active)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?
        .last_insert_rowid();

        debug!("Created user {} with id {}", new_user.email, id);

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created user"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let result = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get user by id")?;

        Ok(result)
    }

    /// Emails are matched case-insensitively
    #[inline]
    pub async fn get_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let result = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
            .context("Failed to get user by email")?;

        Ok(result)
    }

    /// Mark the account as verified. Returns the updated user, or `None` if it does not exist.
    #[inline]
    pub async fn mark_verified(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
        let now = Utc::now().naive_utc();
        let rows = sqlx::query(
            "UPDATE users SET is_verified = 1, verified_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark user as verified")?
        .rows_affected();

        if rows == 0 {
            return Ok(None);
        }

        Self::get_by_id(pool, id).await
    }

    #[inline]
    pub async fn set_active(pool: &SqlitePool, id: i64, active: bool) -> Result<Option<User>> {
        let rows = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update user status")?
            .rows_affected();

        if rows == 0 {
            return Ok(None);
        }

        Self::get_by_id(pool, id).await
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .context("Failed to count users")?;

        Ok(count)
    }
}
