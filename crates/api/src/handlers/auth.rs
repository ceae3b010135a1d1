//! Handlers for the `/auth` resource: registration, login, token refresh,
//! logout, email verification and password reset.
//!
//! Token delivery depends on the caller's [`ClientContext`]: web clients get
//! `access_token` / `refresh_token` cookies and a body without tokens, every
//! other client gets the tokens in the JSON body.

use agora_db::models::user::UserProfile;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::cookies::{get_cookie, REFRESH_COOKIE_NAME};
use crate::auth::error::AuthError;
use crate::auth::service::{AuthOutcome, ClientContext, RegisterInput};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, MessageBody};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`. `identifier` may be an email or a
/// username; `email` and `username` are accepted as aliases.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "username")]
    pub identifier: String,
    pub password: String,
}

/// Optional body for `POST /auth/refresh` and `POST /auth/logout`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBody {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    #[serde(alias = "newPassword")]
    pub password: String,
}

/// Body returned by register, login, refresh and the OAuth callback.
/// Token fields are omitted for web clients, which receive cookies instead.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

// ---------------------------------------------------------------------------
// Token delivery
// ---------------------------------------------------------------------------

/// Turn an [`AuthOutcome`] into a response, as cookies or body fields
/// depending on the client type.
pub(crate) fn deliver(
    state: &AppState,
    ctx: &ClientContext,
    status: StatusCode,
    outcome: AuthOutcome,
) -> Response {
    let mut headers = HeaderMap::new();
    let tokens = outcome.tokens;

    let body = if ctx.client_type.uses_cookies() {
        state.cookies.set_tokens(
            &mut headers,
            &tokens.access_token,
            tokens.expires_in,
            &tokens.refresh_token,
            tokens.refresh_expires_in,
        );
        AuthResponse {
            user: outcome.user,
            access_token: None,
            refresh_token: None,
            expires_in: tokens.expires_in,
        }
    } else {
        AuthResponse {
            user: outcome.user,
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            expires_in: tokens.expires_in,
        }
    };

    (status, headers, Json(body)).into_response()
}

/// Refresh token from the cookie (web clients) or the JSON body.
///
/// The body is parsed leniently: a missing or malformed body is treated as
/// carrying no token.
fn presented_refresh_token(ctx: &ClientContext, headers: &HeaderMap, body: &Bytes) -> Option<String> {
    let from_cookie = || get_cookie(headers, REFRESH_COOKIE_NAME).map(str::to_string);
    let from_body = || {
        serde_json::from_slice::<RefreshTokenBody>(body)
            .ok()
            .and_then(|b| b.refresh_token)
            .filter(|t| !t.is_empty())
    };

    if ctx.client_type.uses_cookies() {
        from_cookie().or_else(from_body)
    } else {
        from_body().or_else(from_cookie)
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    ctx: ClientContext,
    Json(input): Json<RegisterInput>,
) -> AppResult<Response> {
    let outcome = state.auth.register(input, &ctx).await?;
    Ok(deliver(&state, &ctx, StatusCode::CREATED, outcome))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    ctx: ClientContext,
    Json(input): Json<LoginRequest>,
) -> AppResult<Response> {
    let outcome = state
        .auth
        .login(&input.identifier, &input.password, &ctx)
        .await?;
    Ok(deliver(&state, &ctx, StatusCode::OK, outcome))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token for a new token pair. Web clients whose refresh
/// fails also get their token cookies cleared.
pub async fn refresh(
    State(state): State<AppState>,
    ctx: ClientContext,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = match presented_refresh_token(&ctx, &headers, &body) {
        Some(token) => state.auth.refresh(&token).await.map_err(AppError::from),
        None => {
            tracing::debug!(client_type = ?ctx.client_type, "Refresh without token");
            Err(AppError::Auth(AuthError::MalformedRefreshToken))
        }
    };

    match result {
        Ok(outcome) => deliver(&state, &ctx, StatusCode::OK, outcome),
        Err(err) => {
            let mut response = err.into_response();
            if ctx.client_type.uses_cookies() && response.status() == StatusCode::UNAUTHORIZED {
                state.cookies.clear_tokens(response.headers_mut());
            }
            response
        }
    }
}

/// POST /api/v1/auth/logout
///
/// Revoke the presented session if there is one. Always returns 200 and
/// clears the token cookies.
pub async fn logout(
    State(state): State<AppState>,
    ctx: ClientContext,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = presented_refresh_token(&ctx, &headers, &body);
    state.auth.logout(token.as_deref()).await;

    let mut response_headers = HeaderMap::new();
    state.cookies.clear_tokens(&mut response_headers);
    (
        StatusCode::OK,
        response_headers,
        Json(DataResponse::message("Logged out")),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokedCount {
    pub revoked: u64,
}

/// POST /api/v1/auth/logout-all
///
/// Revoke every session of the caller, including the current one.
pub async fn logout_all(State(state): State<AppState>, user: AuthUser) -> AppResult<Response> {
    let revoked = state.auth.logout_all(user.user_id).await?;

    let mut headers = HeaderMap::new();
    state.cookies.clear_tokens(&mut headers);
    Ok((
        StatusCode::OK,
        headers,
        Json(DataResponse {
            data: RevokedCount { revoked },
        }),
    )
        .into_response())
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<UserProfile>>> {
    let profile = state.auth.current_user(user.user_id).await?;
    Ok(Json(DataResponse { data: profile }))
}

/// GET /api/v1/auth/verify-email?token=
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> AppResult<Json<DataResponse<MessageBody>>> {
    state.auth.verify_email(&query.token).await?;
    Ok(Json(DataResponse::message("Email verified")))
}

/// POST /api/v1/auth/forgot-password
///
/// Always 200, whether or not the address belongs to an account.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordRequest>,
) -> Json<DataResponse<MessageBody>> {
    state.auth.forgot_password(&input.email).await;
    Json(DataResponse::message(
        "If an account exists for this email, a reset link has been sent",
    ))
}

/// POST /api/v1/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<Json<DataResponse<MessageBody>>> {
    state.auth.reset_password(&input.token, input.password).await?;
    Ok(Json(DataResponse::message("Password has been reset")))
}

#[cfg(test)]
mod tests {
    use agora_core::client::ClientType;
    use axum::http::header::COOKIE;
    use axum::http::HeaderValue;

    use super::*;

    fn ctx(client_type: ClientType) -> ClientContext {
        ClientContext {
            client_type,
            ..Default::default()
        }
    }

    #[test]
    fn web_prefers_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("refresh_token=from-cookie"));
        let body = Bytes::from_static(br#"{"refreshToken":"from-body"}"#);

        assert_eq!(
            presented_refresh_token(&ctx(ClientType::Web), &headers, &body).as_deref(),
            Some("from-cookie")
        );
        assert_eq!(
            presented_refresh_token(&ctx(ClientType::Other), &headers, &body).as_deref(),
            Some("from-body")
        );
    }

    #[test]
    fn malformed_body_means_no_token() {
        let body = Bytes::from_static(b"not json");
        assert_eq!(
            presented_refresh_token(&ctx(ClientType::Other), &HeaderMap::new(), &body),
            None
        );
        assert_eq!(
            presented_refresh_token(&ctx(ClientType::Other), &HeaderMap::new(), &Bytes::new()),
            None
        );
    }
}
