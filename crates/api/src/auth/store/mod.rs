//! Persistence contracts consumed by the session manager and auth service.
//!
//! The traits are object-safe so that [`AppState`](crate::state::AppState)
//! can hold either backend behind an `Arc<dyn _>`:
//!
//! - [`postgres::PgStore`] -- production backend over the `agora-db` repositories.
//! - [`memory::MemoryStore`] -- single-lock in-memory backend for tests and
//!   local runs without `DATABASE_URL`.
//!
//! Implementations must make [`SessionStore::rotate`] an atomic
//! compare-and-swap on the session version.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use agora_core::types::{DbId, Timestamp};
use agora_db::models::session::{CreateSession, Session};
use agora_db::models::user::{CreateUser, User};
use agora_db::models::verification_token::{
    CreateVerificationToken, TokenPurpose, VerificationToken,
};
use async_trait::async_trait;

use super::error::AuthError;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// The three stores, backed by one implementation.
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub verification_tokens: Arc<dyn VerificationTokenStore>,
}

impl Stores {
    pub fn postgres(pool: agora_db::DbPool) -> Self {
        Self::from_backend(Arc::new(PgStore::new(pool)))
    }

    pub fn memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }

    fn from_backend<S>(store: Arc<S>) -> Self
    where
        S: SessionStore + UserStore + VerificationTokenStore + 'static,
    {
        Self {
            sessions: store.clone(),
            users: store.clone(),
            verification_tokens: store,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A unique constraint was violated.
    #[error("{0}")]
    Conflict(String),

    #[error("store operation timed out")]
    Timeout,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, input: &CreateSession) -> Result<Session, StoreError>;

    /// Look up a session in any state.
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    /// Bump `last_used_at` on an unrevoked session.
    async fn touch(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Increment the version, set `expires_at` and bump `last_used_at`, only
    /// if the row is still at `expected_version`, unrevoked and unexpired.
    async fn rotate(
        &self,
        session_id: &str,
        expected_version: i32,
        expires_at: Timestamp,
    ) -> Result<Option<Session>, StoreError>;

    /// Soft-revoke. Returns `false` if the session was unknown or already revoked.
    async fn revoke(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Soft-revoke every active session of a user; returns the revoked ids.
    async fn revoke_all_for_user(&self, user_id: DbId) -> Result<Vec<String>, StoreError>;

    /// Soft-revoke the listed active sessions owned by `user_id`; returns the revoked ids.
    async fn revoke_many(
        &self,
        user_id: DbId,
        session_ids: &[String],
    ) -> Result<Vec<String>, StoreError>;

    /// Hard-delete one row.
    async fn delete(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Hard-delete every row with `expires_at < now`.
    async fn delete_expired(&self) -> Result<u64, StoreError>;

    async fn list_active_for_user(&self, user_id: DbId) -> Result<Vec<Session>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the email or username is taken.
    async fn create(&self, input: &CreateUser) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, StoreError>;
    /// Drop the password hash, leaving only identity-provider sign-in.
    async fn clear_password(&self, id: DbId) -> Result<bool, StoreError>;
    async fn mark_email_verified(&self, id: DbId) -> Result<bool, StoreError>;
    /// Returns the new consecutive-failure count.
    async fn record_failed_login(&self, id: DbId) -> Result<i32, StoreError>;
    async fn lock_account(&self, id: DbId, until: Timestamp) -> Result<(), StoreError>;
    async fn record_successful_login(&self, id: DbId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait VerificationTokenStore: Send + Sync {
    async fn create(
        &self,
        input: &CreateVerificationToken,
    ) -> Result<VerificationToken, StoreError>;

    /// Find an unused, unexpired token by hash and purpose.
    async fn find_valid(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<VerificationToken>, StoreError>;

    /// Consume a token. Returns `false` if it was already used.
    async fn mark_used(&self, id: DbId) -> Result<bool, StoreError>;
}

/// Run a store call under `deadline`, logging failures with the operation name.
pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    op: &'static str,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, AuthError> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(StoreError::Conflict(message))) => Err(AuthError::Conflict(message)),
        Ok(Err(e)) => {
            tracing::error!(op, error = %e, "Store failure");
            Err(e.into())
        }
        Err(_) => {
            tracing::error!(
                op,
                timeout_ms = deadline.as_millis() as u64,
                "Store deadline exceeded"
            );
            Err(StoreError::Timeout.into())
        }
    }
}
