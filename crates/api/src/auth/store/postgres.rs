//! PostgreSQL store backed by the `agora-db` repositories.

use agora_core::types::{DbId, Timestamp};
use agora_db::models::session::{CreateSession, Session};
use agora_db::models::user::{CreateUser, User};
use agora_db::models::verification_token::{
    CreateVerificationToken, TokenPurpose, VerificationToken,
};
use agora_db::repositories::{SessionRepo, UserRepo, VerificationTokenRepo};
use agora_db::DbPool;
use async_trait::async_trait;

use super::{SessionStore, StoreError, UserStore, VerificationTokenStore};

/// PostgreSQL unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Classify a sqlx error into a [`StoreError`].
///
/// - Unique constraint violations map to `Conflict`, worded for the known `uq_` indexes.
/// - Pool acquisition timeouts map to `Timeout`.
/// - Everything else is a `Database` error.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let message = match db_err.constraint().unwrap_or("unknown") {
                "uq_users_email" => "Email already registered".to_string(),
                "uq_users_username" => "Username already taken".to_string(),
                other => format!("Duplicate value violates unique constraint: {other}"),
            };
            return StoreError::Conflict(message);
        }
    }
    if matches!(err, sqlx::Error::PoolTimedOut) {
        return StoreError::Timeout;
    }
    StoreError::Database(err)
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create(&self, input: &CreateSession) -> Result<Session, StoreError> {
        SessionRepo::create(&self.pool, input).await.map_err(classify)
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        SessionRepo::find_by_session_id(&self.pool, session_id)
            .await
            .map_err(classify)
    }

    async fn touch(&self, session_id: &str) -> Result<bool, StoreError> {
        SessionRepo::touch(&self.pool, session_id)
            .await
            .map_err(classify)
    }

    async fn rotate(
        &self,
        session_id: &str,
        expected_version: i32,
        expires_at: Timestamp,
    ) -> Result<Option<Session>, StoreError> {
        SessionRepo::rotate(&self.pool, session_id, expected_version, expires_at)
            .await
            .map_err(classify)
    }

    async fn revoke(&self, session_id: &str) -> Result<bool, StoreError> {
        SessionRepo::revoke(&self.pool, session_id)
            .await
            .map_err(classify)
    }

    async fn revoke_all_for_user(&self, user_id: DbId) -> Result<Vec<String>, StoreError> {
        SessionRepo::revoke_all_for_user(&self.pool, user_id)
            .await
            .map_err(classify)
    }

    async fn revoke_many(
        &self,
        user_id: DbId,
        session_ids: &[String],
    ) -> Result<Vec<String>, StoreError> {
        SessionRepo::revoke_many(&self.pool, user_id, session_ids)
            .await
            .map_err(classify)
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        SessionRepo::delete(&self.pool, session_id)
            .await
            .map_err(classify)
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        SessionRepo::delete_expired(&self.pool).await.map_err(classify)
    }

    async fn list_active_for_user(&self, user_id: DbId) -> Result<Vec<Session>, StoreError> {
        SessionRepo::list_active_for_user(&self.pool, user_id)
            .await
            .map_err(classify)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        agora_db::health_check(&self.pool).await.map_err(classify)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, input: &CreateUser) -> Result<User, StoreError> {
        UserRepo::create(&self.pool, input).await.map_err(classify)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
        UserRepo::find_by_id(&self.pool, id).await.map_err(classify)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        UserRepo::find_by_email(&self.pool, email)
            .await
            .map_err(classify)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        UserRepo::find_by_username(&self.pool, username)
            .await
            .map_err(classify)
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, StoreError> {
        UserRepo::update_password(&self.pool, id, password_hash)
            .await
            .map_err(classify)
    }

    async fn clear_password(&self, id: DbId) -> Result<bool, StoreError> {
        UserRepo::clear_password(&self.pool, id)
            .await
            .map_err(classify)
    }

    async fn mark_email_verified(&self, id: DbId) -> Result<bool, StoreError> {
        UserRepo::mark_email_verified(&self.pool, id)
            .await
            .map_err(classify)
    }

    async fn record_failed_login(&self, id: DbId) -> Result<i32, StoreError> {
        UserRepo::increment_failed_login(&self.pool, id)
            .await
            .map_err(classify)
    }

    async fn lock_account(&self, id: DbId, until: Timestamp) -> Result<(), StoreError> {
        UserRepo::lock_account(&self.pool, id, until)
            .await
            .map_err(classify)
    }

    async fn record_successful_login(&self, id: DbId) -> Result<(), StoreError> {
        UserRepo::record_successful_login(&self.pool, id)
            .await
            .map_err(classify)
    }
}

#[async_trait]
impl VerificationTokenStore for PgStore {
    async fn create(
        &self,
        input: &CreateVerificationToken,
    ) -> Result<VerificationToken, StoreError> {
        VerificationTokenRepo::create(&self.pool, input)
            .await
            .map_err(classify)
    }

    async fn find_valid(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<VerificationToken>, StoreError> {
        VerificationTokenRepo::find_valid(&self.pool, token_hash, purpose)
            .await
            .map_err(classify)
    }

    async fn mark_used(&self, id: DbId) -> Result<bool, StoreError> {
        VerificationTokenRepo::mark_used(&self.pool, id)
            .await
            .map_err(classify)
    }
}
