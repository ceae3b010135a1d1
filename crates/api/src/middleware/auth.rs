//! Access-token authentication extractor for Axum handlers.

use agora_core::types::DbId;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::client::client_type;
use crate::auth::cookies::{get_cookie, ACCESS_COOKIE_NAME};
use crate::auth::error::AuthError;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from the access token.
///
/// Web clients send the token in the `access_token` cookie (a Bearer header
/// is accepted as a fallback); every other client must use
/// `Authorization: Bearer <token>`. Tokens whose session was revoked in this
/// process are refused even before they expire.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub email: String,
    pub role: String,
    /// Session the access token was minted for.
    pub session_id: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = if client_type(parts).uses_cookies() {
            get_cookie(&parts.headers, ACCESS_COOKIE_NAME).or_else(|| bearer_token(parts))
        } else {
            bearer_token(parts)
        }
        .ok_or(AuthError::InvalidAccessToken)?;

        let claims = state.codec.validate_access_token(token)?;

        if state.sessions.is_revoked(&claims.sid).await {
            tracing::debug!(user_id = claims.sub, session_id = %claims.sid, "Access token for revoked session");
            return Err(AuthError::InvalidAccessToken.into());
        }

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
            session_id: claims.sid,
        })
    }
}
