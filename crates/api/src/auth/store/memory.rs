//! In-memory store used by the test suite and by local runs without a database.
//!
//! Every operation takes the single write (or read) lock for its whole
//! duration, which makes each trait method atomic with respect to the others,
//! including the compare-and-swap in [`SessionStore::rotate`].

use std::collections::HashMap;

use agora_core::types::{DbId, Timestamp};
use agora_db::models::session::{CreateSession, Session};
use agora_db::models::user::{CreateUser, User};
use agora_db::models::verification_token::{
    CreateVerificationToken, TokenPurpose, VerificationToken,
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{SessionStore, StoreError, UserStore, VerificationTokenStore};

#[derive(Default)]
struct Inner {
    next_id: DbId,
    users: HashMap<DbId, User>,
    /// Keyed by the opaque `session_id`.
    sessions: HashMap<String, Session>,
    tokens: HashMap<DbId, VerificationToken>,
}

impl Inner {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn deactivate(&self, id: DbId) {
        if let Some(user) = self.inner.write().await.users.get_mut(&id) {
            user.is_active = false;
        }
    }
}

fn is_active(session: &Session, now: Timestamp) -> bool {
    session.state(now).is_active()
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, input: &CreateSession) -> Result<Session, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(&input.session_id) {
            return Err(StoreError::Conflict(
                "Duplicate value violates unique constraint: uq_user_sessions_session_id".into(),
            ));
        }
        let now = Utc::now();
        let session = Session {
            id: inner.allocate_id(),
            session_id: input.session_id.clone(),
            user_id: input.user_id,
            user_agent: input.user_agent.clone(),
            ip_address: input.ip_address.clone(),
            is_revoked: false,
            version: 0,
            expires_at: input.expires_at,
            last_used_at: now,
            created_at: now,
        };
        inner
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.read().await.sessions.get(session_id).cloned())
    }

    async fn touch(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(session_id) {
            Some(session) if !session.is_revoked => {
                session.last_used_at = Utc::now().max(session.created_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate(
        &self,
        session_id: &str,
        expected_version: i32,
        expires_at: Timestamp,
    ) -> Result<Option<Session>, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        match inner.sessions.get_mut(session_id) {
            Some(session) if session.version == expected_version && is_active(session, now) => {
                session.version += 1;
                session.expires_at = expires_at;
                session.last_used_at = now.max(session.created_at);
                Ok(Some(session.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn revoke(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(session_id) {
            Some(session) if !session.is_revoked => {
                session.is_revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: DbId) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.write().await;
        let mut revoked = Vec::new();
        for session in inner.sessions.values_mut() {
            if session.user_id == user_id && !session.is_revoked {
                session.is_revoked = true;
                revoked.push(session.session_id.clone());
            }
        }
        Ok(revoked)
    }

    async fn revoke_many(
        &self,
        user_id: DbId,
        session_ids: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut revoked = Vec::new();
        for session_id in session_ids {
            if let Some(session) = inner.sessions.get_mut(session_id) {
                if session.user_id == user_id && is_active(session, now) {
                    session.is_revoked = true;
                    revoked.push(session.session_id.clone());
                }
            }
        }
        Ok(revoked)
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .write()
            .await
            .sessions
            .remove(session_id)
            .is_some())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, session| session.expires_at >= now);
        Ok((before - inner.sessions.len()) as u64)
    }

    async fn list_active_for_user(&self, user_id: DbId) -> Result<Vec<Session>, StoreError> {
        let inner = self.inner.read().await;
        let now = Utc::now();
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && is_active(s, now))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(sessions)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, input: &CreateUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == input.email) {
            return Err(StoreError::Conflict("Email already registered".into()));
        }
        if inner.users.values().any(|u| u.username == input.username) {
            return Err(StoreError::Conflict("Username already taken".into()));
        }
        let now = Utc::now();
        let user = User {
            id: inner.allocate_id(),
            username: input.username.clone(),
            email: input.email.clone(),
            password_hash: input.password_hash.clone(),
            role: input.role.clone(),
            is_active: true,
            email_verified: input.email_verified,
            last_login_at: None,
            failed_login_count: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(match inner.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = Some(password_hash.to_string());
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn clear_password(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(match inner.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = None;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn mark_email_verified(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(match inner.users.get_mut(&id) {
            Some(user) => {
                user.email_verified = true;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn record_failed_login(&self, id: DbId) -> Result<i32, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(match inner.users.get_mut(&id) {
            Some(user) => {
                user.failed_login_count += 1;
                user.failed_login_count
            }
            None => 0,
        })
    }

    async fn lock_account(&self, id: DbId, until: Timestamp) -> Result<(), StoreError> {
        if let Some(user) = self.inner.write().await.users.get_mut(&id) {
            user.locked_until = Some(until);
        }
        Ok(())
    }

    async fn record_successful_login(&self, id: DbId) -> Result<(), StoreError> {
        if let Some(user) = self.inner.write().await.users.get_mut(&id) {
            user.failed_login_count = 0;
            user.locked_until = None;
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl VerificationTokenStore for MemoryStore {
    async fn create(
        &self,
        input: &CreateVerificationToken,
    ) -> Result<VerificationToken, StoreError> {
        let mut inner = self.inner.write().await;
        let token = VerificationToken {
            id: inner.allocate_id(),
            user_id: input.user_id,
            token_hash: input.token_hash.clone(),
            purpose: input.purpose.as_str().to_string(),
            expires_at: input.expires_at,
            used_at: None,
            created_at: Utc::now(),
        };
        inner.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_valid(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let inner = self.inner.read().await;
        let now = Utc::now();
        Ok(inner
            .tokens
            .values()
            .find(|t| {
                t.token_hash == token_hash
                    && t.purpose == purpose.as_str()
                    && t.used_at.is_none()
                    && t.expires_at > now
            })
            .cloned())
    }

    async fn mark_used(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(match inner.tokens.get_mut(&id) {
            Some(token) if token.used_at.is_none() => {
                token.used_at = Some(Utc::now());
                true
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_session(session_id: &str, user_id: DbId, expires_in: Duration) -> CreateSession {
        CreateSession {
            session_id: session_id.to_string(),
            user_id,
            user_agent: Some("test-agent".to_string()),
            ip_address: Some("127.0.0.1".to_string()),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn rotate_is_compare_and_swap() {
        let store = MemoryStore::new();
        SessionStore::create(&store, &new_session("s1", 1, Duration::days(7)))
            .await
            .unwrap();

        let expires = Utc::now() + Duration::days(7);
        let first = store.rotate("s1", 0, expires).await.unwrap();
        assert_eq!(first.map(|s| s.version), Some(1));

        // The same expected version loses the second time.
        assert!(store.rotate("s1", 0, expires).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rotate_refuses_revoked_sessions() {
        let store = MemoryStore::new();
        SessionStore::create(&store, &new_session("s1", 1, Duration::days(7)))
            .await
            .unwrap();
        assert!(store.revoke("s1").await.unwrap());
        assert!(!store.revoke("s1").await.unwrap(), "revocation is idempotent");

        let expires = Utc::now() + Duration::days(7);
        assert!(store.rotate("s1", 0, expires).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_expired_removes_only_expired_rows() {
        let store = MemoryStore::new();
        for (id, ttl) in [
            ("past-1", Duration::seconds(-10)),
            ("past-2", Duration::days(-3)),
            ("future", Duration::days(1)),
        ] {
            SessionStore::create(&store, &new_session(id, 1, ttl))
                .await
                .unwrap();
        }
        store.revoke("future").await.unwrap();

        assert_eq!(store.delete_expired().await.unwrap(), 2);
        assert!(store.find_by_session_id("past-1").await.unwrap().is_none());
        assert!(store.find_by_session_id("past-2").await.unwrap().is_none());
        // Revoked but unexpired rows are kept for audit.
        assert!(store.find_by_session_id("future").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revoke_many_only_touches_owned_sessions() {
        let store = MemoryStore::new();
        SessionStore::create(&store, &new_session("mine", 1, Duration::days(1)))
            .await
            .unwrap();
        SessionStore::create(&store, &new_session("theirs", 2, Duration::days(1)))
            .await
            .unwrap();

        let revoked = store
            .revoke_many(1, &["mine".to_string(), "theirs".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(revoked, vec!["mine".to_string()]);
        let theirs = store.find_by_session_id("theirs").await.unwrap().unwrap();
        assert!(!theirs.is_revoked);
    }

    #[tokio::test]
    async fn revoke_many_skips_expired_sessions() {
        let store = MemoryStore::new();
        SessionStore::create(&store, &new_session("stale", 1, Duration::seconds(-5)))
            .await
            .unwrap();

        let revoked = store.revoke_many(1, &["stale".to_string()]).await.unwrap();
        assert!(revoked.is_empty());
        let stale = store.find_by_session_id("stale").await.unwrap().unwrap();
        assert!(!stale.is_revoked);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        let input = CreateUser {
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: None,
            role: "user".into(),
            email_verified: false,
        };
        UserStore::create(&store, &input).await.unwrap();

        let dup = CreateUser {
            username: "ada2".into(),
            ..input
        };
        let err = UserStore::create(&store, &dup).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(msg) if msg == "Email already registered"));
    }
}
