//! Lifecycle classification for refresh-token sessions.
//!
//! A session is `Active` until it is either revoked (explicit, terminal) or
//! passes its `expires_at` (detected lazily on access). Revocation wins over
//! expiry so that audit output reports the explicit action.

use serde::Serialize;

use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Expired,
    Revoked,
}

impl SessionState {
    /// Classify a session from its stored flags at instant `now`.
    ///
    /// `expires_at == now` counts as still active; a session is expired only
    /// once `expires_at < now`.
    pub fn classify(is_revoked: bool, expires_at: Timestamp, now: Timestamp) -> Self {
        if is_revoked {
            SessionState::Revoked
        } else if expires_at < now {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }

    pub fn is_active(self) -> bool {
        self == SessionState::Active
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn unrevoked_future_session_is_active() {
        let now = Utc::now();
        let state = SessionState::classify(false, now + Duration::days(1), now);
        assert_eq!(state, SessionState::Active);
        assert!(state.is_active());
    }

    #[test]
    fn past_expiry_is_expired() {
        let now = Utc::now();
        let state = SessionState::classify(false, now - Duration::seconds(1), now);
        assert_eq!(state, SessionState::Expired);
    }

    #[test]
    fn expiry_boundary_is_still_active() {
        let now = Utc::now();
        assert_eq!(
            SessionState::classify(false, now, now),
            SessionState::Active
        );
    }

    #[test]
    fn revoked_wins_over_expired() {
        let now = Utc::now();
        let state = SessionState::classify(true, now - Duration::days(1), now);
        assert_eq!(state, SessionState::Revoked);
        assert!(!state.is_active());
    }
}
