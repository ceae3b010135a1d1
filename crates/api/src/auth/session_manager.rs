//! Session lifecycle: creation, refresh-token verification and rotation,
//! revocation and expiry cleanup.
//!
//! ```text
//!   create_session ──> ACTIVE ──(expires_at < now)──> EXPIRED  (row deleted on access)
//!                        │  ▲
//!                 rotate │  │ version + 1, expires_at extended
//!                        └──┘
//!                        │
//!                        └──(revoke)──> REVOKED  (terminal, row kept until expiry sweep)
//! ```
//!
//! A refresh token names a session *and* the version it was minted for.
//! Rotation is a compare-and-swap on that version, so a token can be
//! exchanged at most once and concurrent refreshes with the same token
//! produce at most one successor.
//!
//! Every store call runs under the configured deadline; a store failure or
//! timeout surfaces as [`AuthError::Transient`], never as one of the
//! session-validity reasons.

use std::future::Future;
use std::sync::Arc;

use agora_core::session_state::SessionState;
use agora_core::types::{DbId, Timestamp};
use agora_db::models::session::{CreateSession, Session};
use agora_db::models::user::User;
use chrono::{Duration, Utc};

use super::codec::TokenCodec;
use super::denylist::RevokedSessions;
use super::error::AuthError;
use super::secrets::generate_session_id;
use super::store::{with_deadline, SessionStore, StoreError, UserStore};

/// Lifetime and deadline settings for session operations.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// How long a session stays valid after creation or its last rotation.
    pub refresh_lifetime: Duration,
    /// Upper bound on each individual store call.
    pub store_timeout: std::time::Duration,
}

/// Provenance captured when a session is created. Never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct SessionMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// A freshly minted refresh token and the session it belongs to.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: String,
    pub refresh_token: String,
    pub expires_at: Timestamp,
}

/// Result of a successful refresh-token verification.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub user: User,
    pub session_id: String,
    /// Version the presented token was minted for; pass it to [`SessionManager::rotate`].
    pub version: i32,
}

/// How the caller identifies the session to revoke.
#[derive(Debug, Clone)]
pub enum RevokeBy {
    /// A refresh token, as held by a client logging out.
    Token(String),
    /// A bare session id, as listed by the session-management endpoints.
    SessionId(String),
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    codec: Arc<TokenCodec>,
    revoked: Arc<RevokedSessions>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        codec: Arc<TokenCodec>,
        revoked: Arc<RevokedSessions>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            users,
            codec,
            revoked,
            policy,
        }
    }

    pub fn refresh_lifetime(&self) -> Duration {
        self.policy.refresh_lifetime
    }

    /// Persist a new session for `user_id` and mint its first refresh token.
    pub async fn create_session(
        &self,
        user_id: DbId,
        metadata: SessionMetadata,
    ) -> Result<IssuedSession, AuthError> {
        let input = CreateSession {
            session_id: generate_session_id(),
            user_id,
            user_agent: metadata.user_agent,
            ip_address: metadata.ip_address,
            expires_at: Utc::now() + self.policy.refresh_lifetime,
        };
        let session = self.bounded("create", self.store.create(&input)).await?;

        tracing::info!(
            user_id,
            session_id = %session.session_id,
            expires_at = %session.expires_at,
            "Session created"
        );

        Ok(IssuedSession {
            refresh_token: self
                .codec
                .mint_refresh_token(&session.session_id, session.version),
            session_id: session.session_id,
            expires_at: session.expires_at,
        })
    }

    /// Check a refresh token against the store and resolve its owner.
    ///
    /// Fails with one of the session-validity reasons (see
    /// [`AuthError::is_session_failure`]). An expired session is deleted as
    /// a side effect. On success `last_used_at` is bumped.
    pub async fn verify_and_consume(
        &self,
        refresh_token: &str,
    ) -> Result<SessionIdentity, AuthError> {
        let result = self.verify_inner(refresh_token).await;
        if let Err(err) = &result {
            if err.is_session_failure() {
                tracing::warn!(reason = %err, "Refresh token rejected");
            }
        }
        result
    }

    async fn verify_inner(&self, refresh_token: &str) -> Result<SessionIdentity, AuthError> {
        let payload = self.codec.decode_refresh_token(refresh_token)?;

        let session = self
            .bounded("find", self.store.find_by_session_id(&payload.sid))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        match session.state(Utc::now()) {
            SessionState::Active => {}
            SessionState::Revoked => return Err(AuthError::SessionRevoked),
            SessionState::Expired => {
                self.delete_expired_session(&session).await;
                return Err(AuthError::SessionExpired);
            }
        }

        if payload.v != session.version {
            tracing::debug!(
                session_id = %session.session_id,
                presented = payload.v,
                current = session.version,
                "Refresh token version mismatch"
            );
            return Err(AuthError::StaleRefreshToken);
        }

        let user = self
            .bounded("find_user", self.users.find_by_id(session.user_id))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        self.bounded("touch", self.store.touch(&session.session_id))
            .await?;

        Ok(SessionIdentity {
            user,
            session_id: session.session_id,
            version: session.version,
        })
    }

    async fn delete_expired_session(&self, session: &Session) {
        match self
            .bounded("delete", self.store.delete(&session.session_id))
            .await
        {
            Ok(_) => tracing::debug!(session_id = %session.session_id, "Expired session deleted"),
            Err(e) => tracing::warn!(
                session_id = %session.session_id,
                error = %e,
                "Failed to delete expired session"
            ),
        }
    }

    /// Advance the session past `expected_version`, extend its expiry and
    /// mint the successor refresh token.
    ///
    /// Fails with [`AuthError::StaleRefreshToken`] if the session moved on
    /// (another rotation won), was revoked, or expired in the meantime.
    pub async fn rotate(
        &self,
        session_id: &str,
        expected_version: i32,
    ) -> Result<IssuedSession, AuthError> {
        let expires_at = Utc::now() + self.policy.refresh_lifetime;
        let rotated = self
            .bounded(
                "rotate",
                self.store.rotate(session_id, expected_version, expires_at),
            )
            .await?;

        let Some(session) = rotated else {
            tracing::warn!(session_id, expected_version, "Rotation lost: session changed concurrently");
            return Err(AuthError::StaleRefreshToken);
        };

        tracing::debug!(session_id, version = session.version, "Session rotated");

        Ok(IssuedSession {
            refresh_token: self
                .codec
                .mint_refresh_token(&session.session_id, session.version),
            session_id: session.session_id,
            expires_at: session.expires_at,
        })
    }

    /// Revoke one session. Returns `false` if it was unknown or already revoked.
    ///
    /// A [`RevokeBy::Token`] that cannot be decoded fails with
    /// [`AuthError::MalformedRefreshToken`].
    pub async fn revoke(&self, by: RevokeBy) -> Result<bool, AuthError> {
        let session_id = match by {
            RevokeBy::Token(token) => self.codec.decode_refresh_token(&token)?.sid,
            RevokeBy::SessionId(id) => id,
        };

        let revoked = self
            .bounded("revoke", self.store.revoke(&session_id))
            .await?;
        if revoked {
            self.revoked.insert(&session_id).await;
            tracing::info!(session_id = %session_id, "Session revoked");
        }
        Ok(revoked)
    }

    /// Revoke every active session of a user. Returns the count.
    pub async fn revoke_all_for_user(&self, user_id: DbId) -> Result<u64, AuthError> {
        let ids = self
            .bounded("revoke_all", self.store.revoke_all_for_user(user_id))
            .await?;
        let count = ids.len() as u64;
        self.revoked.insert_many(ids).await;
        tracing::info!(user_id, count, "All sessions revoked for user");
        Ok(count)
    }

    /// Revoke the listed sessions that belong to `user_id`. Returns the count.
    pub async fn revoke_selected(
        &self,
        user_id: DbId,
        session_ids: &[String],
    ) -> Result<u64, AuthError> {
        let ids = self
            .bounded("revoke_many", self.store.revoke_many(user_id, session_ids))
            .await?;
        let count = ids.len() as u64;
        self.revoked.insert_many(ids).await;
        tracing::info!(user_id, requested = session_ids.len(), count, "Selected sessions revoked");
        Ok(count)
    }

    pub async fn list_active(&self, user_id: DbId) -> Result<Vec<Session>, AuthError> {
        self.bounded("list", self.store.list_active_for_user(user_id))
            .await
    }

    /// Delete every expired session and prune the denylist. Returns the deleted count.
    pub async fn cleanup_expired(&self) -> Result<u64, AuthError> {
        let deleted = self
            .bounded("delete_expired", self.store.delete_expired())
            .await?;
        let pruned = self.revoked.prune().await;
        tracing::debug!(deleted, pruned, "Expired sessions cleaned up");
        Ok(deleted)
    }

    /// `true` if access tokens for this session must be refused.
    pub async fn is_revoked(&self, session_id: &str) -> bool {
        self.revoked.contains(session_id).await
    }

    pub async fn health_check(&self) -> Result<(), AuthError> {
        self.bounded("health_check", self.store.health_check())
            .await
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        with_deadline(self.policy.store_timeout, op, fut).await
    }
}

#[cfg(test)]
mod tests {
    use agora_db::models::user::CreateUser;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::auth::codec::JwtConfig;
    use crate::auth::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        codec: Arc<TokenCodec>,
        manager: SessionManager,
        user: User,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let codec = Arc::new(TokenCodec::new(&JwtConfig {
            secret: "session-manager-tests".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        }));
        let user = UserStore::create(
            store.as_ref(),
            &CreateUser {
                username: "u1".to_string(),
                email: "u1@example.com".to_string(),
                password_hash: None,
                role: "user".to_string(),
                email_verified: true,
            },
        )
        .await
        .unwrap();

        let manager = SessionManager::new(
            store.clone(),
            store.clone(),
            codec.clone(),
            Arc::new(RevokedSessions::new(std::time::Duration::from_secs(900))),
            SessionPolicy {
                refresh_lifetime: Duration::days(7),
                store_timeout: std::time::Duration::from_secs(5),
            },
        );

        Fixture {
            store,
            codec,
            manager,
            user,
        }
    }

    fn metadata() -> SessionMetadata {
        SessionMetadata {
            user_agent: Some("Mozilla/5.0".to_string()),
            ip_address: Some("203.0.113.9".to_string()),
        }
    }

    #[tokio::test]
    async fn created_session_verifies_to_its_owner() {
        let f = fixture().await;
        let issued = f.manager.create_session(f.user.id, metadata()).await.unwrap();

        let identity = f.manager.verify_and_consume(&issued.refresh_token).await.unwrap();
        assert_eq!(identity.user.id, f.user.id);
        assert_eq!(identity.user.email, "u1@example.com");
        assert_eq!(identity.session_id, issued.session_id);

        let stored = f.store.find_by_session_id(&issued.session_id).await.unwrap().unwrap();
        assert_eq!(stored.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(stored.ip_address.as_deref(), Some("203.0.113.9"));
        assert!(stored.last_used_at >= stored.created_at);
    }

    #[tokio::test]
    async fn expiry_is_seven_days_after_creation() {
        let f = fixture().await;
        let issued = f.manager.create_session(f.user.id, metadata()).await.unwrap();

        let stored = f.store.find_by_session_id(&issued.session_id).await.unwrap().unwrap();
        let drift = (stored.expires_at - (stored.created_at + Duration::days(7))).num_seconds();
        assert!(drift.abs() <= 2, "expires_at drifted by {drift}s");
    }

    #[tokio::test]
    async fn revoked_session_rejects_refresh() {
        let f = fixture().await;
        let issued = f.manager.create_session(f.user.id, metadata()).await.unwrap();
        f.manager.verify_and_consume(&issued.refresh_token).await.unwrap();

        let revoked = f
            .manager
            .revoke(RevokeBy::SessionId(issued.session_id.clone()))
            .await
            .unwrap();
        assert!(revoked);
        assert!(f.manager.is_revoked(&issued.session_id).await);

        let err = f.manager.verify_and_consume(&issued.refresh_token).await.unwrap_err();
        assert_matches!(err, AuthError::SessionRevoked);
        assert!(err.is_session_failure());
    }

    #[tokio::test]
    async fn revoke_accepts_refresh_token() {
        let f = fixture().await;
        let issued = f.manager.create_session(f.user.id, metadata()).await.unwrap();

        assert!(f
            .manager
            .revoke(RevokeBy::Token(issued.refresh_token.clone()))
            .await
            .unwrap());
        assert_matches!(
            f.manager.verify_and_consume(&issued.refresh_token).await,
            Err(AuthError::SessionRevoked)
        );
        // Revoked rows are kept, not deleted.
        assert!(f.store.find_by_session_id(&issued.session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revoke_with_garbage_token_is_malformed() {
        let f = fixture().await;
        assert_matches!(
            f.manager.revoke(RevokeBy::Token("garbage!".to_string())).await,
            Err(AuthError::MalformedRefreshToken)
        );
    }

    #[tokio::test]
    async fn rotation_keeps_identity_and_retires_old_token() {
        let f = fixture().await;
        let issued = f.manager.create_session(f.user.id, metadata()).await.unwrap();
        let identity = f.manager.verify_and_consume(&issued.refresh_token).await.unwrap();

        let rotated = f
            .manager
            .rotate(&identity.session_id, identity.version)
            .await
            .unwrap();
        assert_eq!(rotated.session_id, issued.session_id);
        assert_ne!(rotated.refresh_token, issued.refresh_token);

        let again = f.manager.verify_and_consume(&rotated.refresh_token).await.unwrap();
        assert_eq!(again.user.id, f.user.id);

        assert_matches!(
            f.manager.verify_and_consume(&issued.refresh_token).await,
            Err(AuthError::StaleRefreshToken)
        );
    }

    #[tokio::test]
    async fn concurrent_rotations_yield_one_successor() {
        let f = fixture().await;
        let issued = f.manager.create_session(f.user.id, metadata()).await.unwrap();
        let identity = f.manager.verify_and_consume(&issued.refresh_token).await.unwrap();

        let (a, b) = tokio::join!(
            f.manager.rotate(&identity.session_id, identity.version),
            f.manager.rotate(&identity.session_id, identity.version),
        );
        let winners: Vec<IssuedSession> = [a, b].into_iter().filter_map(Result::ok).collect();
        assert_eq!(winners.len(), 1, "exactly one rotation may win");

        assert!(f
            .manager
            .verify_and_consume(&winners[0].refresh_token)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn expired_session_is_rejected_and_deleted() {
        let f = fixture().await;
        let session = SessionStore::create(
            f.store.as_ref(),
            &CreateSession {
                session_id: "expired-session".to_string(),
                user_id: f.user.id,
                user_agent: None,
                ip_address: None,
                expires_at: Utc::now() - Duration::minutes(1),
            },
        )
        .await
        .unwrap();
        let token = f.codec.mint_refresh_token(&session.session_id, session.version);

        assert_matches!(
            f.manager.verify_and_consume(&token).await,
            Err(AuthError::SessionExpired)
        );
        assert!(f.store.find_by_session_id("expired-session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_and_unknown_tokens_are_both_session_failures() {
        let f = fixture().await;

        let malformed = f.manager.verify_and_consume("%%not-base64%%").await.unwrap_err();
        assert_matches!(malformed, AuthError::MalformedRefreshToken);

        let unknown_token = f.codec.mint_refresh_token("no-such-session", 0);
        let unknown = f.manager.verify_and_consume(&unknown_token).await.unwrap_err();
        assert_matches!(unknown, AuthError::SessionNotFound);

        assert!(malformed.is_session_failure() && unknown.is_session_failure());
    }

    #[tokio::test]
    async fn revoke_all_and_selected() {
        let f = fixture().await;
        let a = f.manager.create_session(f.user.id, metadata()).await.unwrap();
        let b = f.manager.create_session(f.user.id, metadata()).await.unwrap();
        let c = f.manager.create_session(f.user.id, metadata()).await.unwrap();

        let count = f
            .manager
            .revoke_selected(f.user.id, &[a.session_id.clone(), "unknown".to_string()])
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(f.manager.list_active(f.user.id).await.unwrap().len(), 2);

        assert_eq!(f.manager.revoke_all_for_user(f.user.id).await.unwrap(), 2);
        assert!(f.manager.list_active(f.user.id).await.unwrap().is_empty());
        for issued in [&b, &c] {
            assert!(f.manager.is_revoked(&issued.session_id).await);
        }
    }

    #[tokio::test]
    async fn cleanup_deletes_exactly_the_expired_sessions() {
        let f = fixture().await;
        let live = f.manager.create_session(f.user.id, metadata()).await.unwrap();
        for (id, offset) in [("gone-1", -1), ("gone-2", -48)] {
            SessionStore::create(
                f.store.as_ref(),
                &CreateSession {
                    session_id: id.to_string(),
                    user_id: f.user.id,
                    user_agent: None,
                    ip_address: None,
                    expires_at: Utc::now() + Duration::hours(offset),
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(f.manager.cleanup_expired().await.unwrap(), 2);
        assert!(f.store.find_by_session_id(&live.session_id).await.unwrap().is_some());
    }

    /// A store whose every call hangs forever.
    struct StalledStore;

    #[async_trait]
    impl SessionStore for StalledStore {
        async fn create(&self, _: &CreateSession) -> Result<Session, StoreError> {
            std::future::pending().await
        }
        async fn find_by_session_id(&self, _: &str) -> Result<Option<Session>, StoreError> {
            std::future::pending().await
        }
        async fn touch(&self, _: &str) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn rotate(&self, _: &str, _: i32, _: Timestamp) -> Result<Option<Session>, StoreError> {
            std::future::pending().await
        }
        async fn revoke(&self, _: &str) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn revoke_all_for_user(&self, _: DbId) -> Result<Vec<String>, StoreError> {
            std::future::pending().await
        }
        async fn revoke_many(&self, _: DbId, _: &[String]) -> Result<Vec<String>, StoreError> {
            std::future::pending().await
        }
        async fn delete(&self, _: &str) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn delete_expired(&self) -> Result<u64, StoreError> {
            std::future::pending().await
        }
        async fn list_active_for_user(&self, _: DbId) -> Result<Vec<Session>, StoreError> {
            std::future::pending().await
        }
        async fn health_check(&self) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_store_surfaces_transient_error() {
        let f = fixture().await;
        let manager = SessionManager::new(
            Arc::new(StalledStore),
            f.store.clone(),
            f.codec.clone(),
            Arc::new(RevokedSessions::new(std::time::Duration::from_secs(900))),
            SessionPolicy {
                refresh_lifetime: Duration::days(7),
                store_timeout: std::time::Duration::from_millis(50),
            },
        );

        let token = f.codec.mint_refresh_token("whatever", 0);
        let err = manager.verify_and_consume(&token).await.unwrap_err();
        assert!(err.is_transient(), "expected transient, got {err:?}");
        assert!(!err.is_session_failure());
    }
}
