//! Google sign-in: redirect to the consent screen and handle the callback.
//!
//! The CSRF state is `<nonce>.<client kind>`; it is sent to Google and kept
//! in the short-lived `oauth_state` cookie, and the callback requires both to
//! match. The client kind lets the callback deliver tokens the way the
//! client that started the flow expects.

use std::sync::Arc;

use agora_core::client::ClientType;
use axum::extract::{Query, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::auth::cookies::{append, get_cookie, OAUTH_STATE_COOKIE_NAME, OAUTH_STATE_MAX_AGE_SECS};
use crate::auth::oauth::GoogleOAuthClient;
use crate::auth::secrets::generate_opaque_token;
use crate::auth::service::ClientContext;
use crate::error::{AppError, AppResult};
use crate::handlers::auth::deliver;
use crate::state::AppState;

const WEB_KIND: &str = "web";
const OTHER_KIND: &str = "other";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn google(state: &AppState) -> AppResult<Arc<GoogleOAuthClient>> {
    state
        .google
        .clone()
        .ok_or_else(|| AppError::NotFound("Google sign-in is not configured".into()))
}

fn client_type_from_state(oauth_state: &str) -> ClientType {
    match oauth_state.rsplit_once('.') {
        Some((_, WEB_KIND)) => ClientType::Web,
        _ => ClientType::Other,
    }
}

/// GET /api/v1/auth/google
pub async fn start(State(state): State<AppState>, ctx: ClientContext) -> AppResult<Response> {
    let client = google(&state)?;

    let kind = if ctx.client_type.uses_cookies() {
        WEB_KIND
    } else {
        OTHER_KIND
    };
    let oauth_state = format!("{}.{kind}", generate_opaque_token());
    let url = client.authorization_url(&oauth_state)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        LOCATION,
        HeaderValue::from_str(url.as_str())
            .map_err(|e| AppError::InternalError(format!("invalid redirect URL: {e}")))?,
    );
    append(
        &mut headers,
        state
            .cookies
            .build(OAUTH_STATE_COOKIE_NAME, &oauth_state, OAUTH_STATE_MAX_AGE_SECS),
    );

    Ok((StatusCode::FOUND, headers).into_response())
}

/// GET /api/v1/auth/google/callback
///
/// Web clients are redirected back to the app with their cookies set;
/// other clients receive the tokens as JSON.
pub async fn callback(
    State(state): State<AppState>,
    ctx: ClientContext,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    let client = google(&state)?;

    if let Some(error) = query.error {
        tracing::info!(error = %error, "Google sign-in cancelled or denied");
        return Err(AppError::BadRequest("Google sign-in was not completed".into()));
    }

    let expected = get_cookie(&headers, OAUTH_STATE_COOKIE_NAME);
    let oauth_state = match (query.state.as_deref(), expected) {
        (Some(received), Some(expected)) if received == expected => received.to_string(),
        _ => {
            tracing::warn!("OAuth state mismatch");
            return Err(AppError::BadRequest("Invalid OAuth state".into()));
        }
    };
    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".into()))?;

    let profile = client.exchange_code(&code).await?;
    let ctx = ClientContext {
        client_type: client_type_from_state(&oauth_state),
        ..ctx
    };
    let outcome = state.auth.oauth_login(profile, &ctx).await?;

    let mut response = if ctx.client_type.uses_cookies() {
        let mut response = deliver(&state, &ctx, StatusCode::FOUND, outcome);
        let target = HeaderValue::from_str(&state.config.app_url)
            .map_err(|e| AppError::InternalError(format!("invalid APP_URL: {e}")))?;
        response.headers_mut().insert(LOCATION, target);
        response
    } else {
        deliver(&state, &ctx, StatusCode::OK, outcome)
    };

    append(
        response.headers_mut(),
        state.cookies.clear(OAUTH_STATE_COOKIE_NAME),
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_suffix_selects_client_type() {
        assert_eq!(client_type_from_state("abc.web"), ClientType::Web);
        assert_eq!(client_type_from_state("abc.other"), ClientType::Other);
        assert_eq!(client_type_from_state("abc"), ClientType::Other);
    }
}
