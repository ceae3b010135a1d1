//! Repository for the `user_sessions` table.
//!
//! Revocation is soft (`is_revoked = true`); rows are only deleted once they
//! have expired.

use agora_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::session::{CreateSession, Session};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, session_id, user_id, user_agent, ip_address, is_revoked, \
                        version, expires_at, last_used_at, created_at";

/// Provides CRUD operations for user sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSession) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_sessions (session_id, user_id, user_agent, ip_address, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(&input.session_id)
            .bind(input.user_id)
            .bind(&input.user_agent)
            .bind(&input.ip_address)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find a session by its opaque identifier, whatever its state.
    pub async fn find_by_session_id(
        pool: &PgPool,
        session_id: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_sessions WHERE session_id = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(session_id)
            .fetch_optional(pool)
            .await
    }

    /// Set `last_used_at = NOW()` on an unrevoked session. Returns `true` if updated.
    pub async fn touch(pool: &PgPool, session_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET last_used_at = NOW()
             WHERE session_id = $1 AND is_revoked = false",
        )
        .bind(session_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically advance a session to its next version.
    ///
    /// The update only applies while the row is still at `expected_version`,
    /// unrevoked and unexpired; otherwise `None` is returned and nothing
    /// changes. Concurrent callers holding the same version race on the row
    /// lock and exactly one of them wins.
    pub async fn rotate(
        pool: &PgPool,
        session_id: &str,
        expected_version: i32,
        expires_at: Timestamp,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "UPDATE user_sessions SET
                version = version + 1,
                expires_at = $3,
                last_used_at = NOW()
             WHERE session_id = $1
               AND version = $2
               AND is_revoked = false
               AND expires_at >= NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(session_id)
            .bind(expected_version)
            .bind(expires_at)
            .fetch_optional(pool)
            .await
    }

    /// Revoke a single session. Returns `true` if the row was updated.
    pub async fn revoke(pool: &PgPool, session_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true
             WHERE session_id = $1 AND is_revoked = false",
        )
        .bind(session_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke all active sessions for a user. Returns the revoked session ids.
    pub async fn revoke_all_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "UPDATE user_sessions SET is_revoked = true
             WHERE user_id = $1 AND is_revoked = false
             RETURNING session_id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Revoke the listed sessions, restricted to those owned by `user_id`.
    ///
    /// Ids that are unknown, revoked, expired or owned by someone else are
    /// skipped. Returns the session ids actually revoked.
    pub async fn revoke_many(
        pool: &PgPool,
        user_id: DbId,
        session_ids: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_scalar::<_, String>(
            "UPDATE user_sessions SET is_revoked = true
             WHERE user_id = $1
               AND session_id = ANY($2)
               AND is_revoked = false
               AND expires_at >= NOW()
             RETURNING session_id",
        )
        .bind(user_id)
        .bind(session_ids)
        .fetch_all(pool)
        .await
    }

    /// Hard-delete a single session. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, session_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session whose `expires_at` is in the past. Returns the count.
    pub async fn delete_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// List a user's unrevoked, unexpired sessions, most recently used first.
    pub async fn list_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_sessions
             WHERE user_id = $1
               AND is_revoked = false
               AND expires_at >= NOW()
             ORDER BY last_used_at DESC"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
