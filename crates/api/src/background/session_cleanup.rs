//! Periodic deletion of expired sessions.
//!
//! Expired rows are also deleted lazily when a refresh token points at one;
//! this sweep catches the sessions nobody comes back for, and prunes the
//! in-process revocation denylist along the way.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::session_manager::SessionManager;

/// Run the cleanup loop every `interval` until `cancel` is triggered.
///
/// The first sweep runs immediately.
pub async fn run(sessions: Arc<SessionManager>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Session cleanup job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                match sessions.cleanup_expired().await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Session cleanup: purged expired sessions");
                    }
                    Ok(_) => tracing::debug!("Session cleanup: nothing to purge"),
                    Err(e) => tracing::error!(error = %e, "Session cleanup failed"),
                }
            }
        }
    }
}
