pub mod admin;
pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/...                  registration, login, tokens, sessions, Google sign-in
/// /admin/sessions/cleanup    expired-session sweep (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
}
