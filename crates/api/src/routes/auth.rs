//! Route definitions for the `/auth` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{auth, oauth, sessions};
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST   /register                register (public)
/// POST   /login                   login (public)
/// POST   /refresh                 refresh (cookie or body token)
/// POST   /logout                  logout (always 200)
/// POST   /logout-all              revoke all own sessions (requires auth)
/// GET    /me                      current user (requires auth)
/// GET    /verify-email?token=     verify email address
/// POST   /forgot-password         request reset link (always 200)
/// POST   /reset-password          set new password
/// GET    /google                  redirect to Google consent
/// GET    /google/callback         complete Google sign-in
/// GET    /sessions                list own sessions (requires auth)
/// DELETE /sessions/{session_id}   revoke one own session (requires auth)
/// POST   /sessions/revoke         revoke several own sessions (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/logout-all", post(auth::logout_all))
        .route("/me", get(auth::me))
        .route("/verify-email", get(auth::verify_email))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/google", get(oauth::start))
        .route("/google/callback", get(oauth::callback))
        .route("/sessions", get(sessions::list))
        .route("/sessions/{session_id}", delete(sessions::revoke_one))
        .route("/sessions/revoke", post(sessions::revoke_many))
}
