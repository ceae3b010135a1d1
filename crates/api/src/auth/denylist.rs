//! Process-local denylist of revoked session ids.
//!
//! Access tokens stay cryptographically valid until `exp` even after their
//! session is revoked. Every revocation path records the session id here
//! and the access-token extractor rejects tokens whose `sid` is listed.
//! An entry only needs to outlive the longest access token that could
//! reference it, so entries expire after the access-token TTL.
//!
//! The list is per process; with several API replicas a revoked access
//! token may still be accepted by a replica that did not perform the
//! revocation until the token's own expiry.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Size above which inserts opportunistically prune expired entries.
const PRUNE_THRESHOLD: usize = 10_000;

pub struct RevokedSessions {
    entries: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
}

impl RevokedSessions {
    /// `ttl` should equal the access-token lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn insert(&self, session_id: &str) {
        self.insert_many(std::iter::once(session_id.to_string()))
            .await;
    }

    pub async fn insert_many(&self, session_ids: impl IntoIterator<Item = String>) {
        let until = Instant::now() + self.ttl;
        let mut entries = self.entries.write().await;
        entries.extend(session_ids.into_iter().map(|id| (id, until)));
        if entries.len() > PRUNE_THRESHOLD {
            let now = Instant::now();
            entries.retain(|_, expiry| *expiry > now);
        }
    }

    /// `true` while the session's revocation is still relevant to access tokens.
    pub async fn contains(&self, session_id: &str) -> bool {
        self.entries
            .read()
            .await
            .get(session_id)
            .is_some_and(|expiry| *expiry > Instant::now())
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn prune(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, expiry| *expiry > now);
        before - entries.len()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listed_session_is_denied() {
        let list = RevokedSessions::new(Duration::from_secs(900));
        list.insert("s1").await;
        assert!(list.contains("s1").await);
        assert!(!list.contains("s2").await);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let list = RevokedSessions::new(Duration::from_secs(60));
        list.insert_many(["a".to_string(), "b".to_string()]).await;
        assert_eq!(list.len().await, 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!list.contains("a").await);
        assert_eq!(list.prune().await, 2);
        assert_eq!(list.len().await, 0);
    }
}
