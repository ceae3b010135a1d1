//! Repository for the `verification_tokens` table.

use agora_core::types::DbId;
use sqlx::PgPool;

use crate::models::verification_token::{
    CreateVerificationToken, TokenPurpose, VerificationToken,
};

const COLUMNS: &str = "id, user_id, token_hash, purpose, expires_at, used_at, created_at";

pub struct VerificationTokenRepo;

impl VerificationTokenRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateVerificationToken,
    ) -> Result<VerificationToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO verification_tokens (user_id, token_hash, purpose, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VerificationToken>(&query)
            .bind(input.user_id)
            .bind(&input.token_hash)
            .bind(input.purpose.as_str())
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find an unused, unexpired token by hash and purpose.
    pub async fn find_valid(
        pool: &PgPool,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<VerificationToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM verification_tokens
             WHERE token_hash = $1
               AND purpose = $2
               AND used_at IS NULL
               AND expires_at > NOW()"
        );
        sqlx::query_as::<_, VerificationToken>(&query)
            .bind(token_hash)
            .bind(purpose.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Consume a token. Returns `false` if it had already been used.
    pub async fn mark_used(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE verification_tokens SET used_at = NOW() WHERE id = $1 AND used_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
