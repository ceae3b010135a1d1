//! User session model and DTOs.

use agora_core::session_state::SessionState;
use agora_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A session row from the `user_sessions` table.
///
/// `id` is the internal surrogate key and never leaves the server;
/// `session_id` is the opaque identifier embedded in refresh tokens.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: DbId,
    pub session_id: String,
    pub user_id: DbId,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub is_revoked: bool,
    pub version: i32,
    pub expires_at: Timestamp,
    pub last_used_at: Timestamp,
    pub created_at: Timestamp,
}

impl Session {
    /// Lifecycle state of this row at instant `now`.
    pub fn state(&self, now: Timestamp) -> SessionState {
        SessionState::classify(self.is_revoked, self.expires_at, now)
    }
}

/// DTO for creating a new session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub session_id: String,
    pub user_id: DbId,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: Timestamp,
}
