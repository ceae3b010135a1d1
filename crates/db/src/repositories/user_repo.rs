//! Repository for the `users` table.

use agora_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, email, password_hash, role, is_active, email_verified, \
                        last_login_at, failed_login_count, locked_until, created_at, updated_at";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash, role, email_verified)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(&input.role)
            .bind(input.email_verified)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by username (case-sensitive).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by email. Emails are stored lowercased.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Update a user's password hash. Returns `true` if the row was updated.
    pub async fn update_password(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove the password so the account can only sign in through the
    /// identity provider. Returns `true` if the row was updated.
    pub async fn clear_password(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = NULL WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the user's email address as verified. Returns `true` if the row was updated.
    pub async fn mark_email_verified(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET email_verified = true WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Increment the failed login counter by 1, returning the new count.
    pub async fn increment_failed_login(pool: &PgPool, id: DbId) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE users SET failed_login_count = failed_login_count + 1
             WHERE id = $1
             RETURNING failed_login_count",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// Lock a user account until the specified timestamp.
    pub async fn lock_account(
        pool: &PgPool,
        id: DbId,
        until: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET locked_until = $2 WHERE id = $1")
            .bind(id)
            .bind(until)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record a successful login: reset `failed_login_count` to 0, clear `locked_until`,
    /// and set `last_login_at` to now.
    pub async fn record_successful_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                failed_login_count = 0,
                locked_until = NULL,
                last_login_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
