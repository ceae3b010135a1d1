//! Route definitions for `/admin`.

use axum::routing::post;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`. All require the `admin` role.
///
/// ```text
/// POST /sessions/cleanup    delete expired sessions now
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/sessions/cleanup", post(admin::cleanup_sessions))
}
