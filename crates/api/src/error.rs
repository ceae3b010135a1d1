use agora_core::error::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::auth::error::{AuthError, REFRESH_REJECTED_MESSAGE};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`AuthError`] for the
/// authentication subsystem, and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce consistent `{"error", "code"}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A resource addressed by something other than a numeric id.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            },

            AppError::Auth(auth) => classify_auth_error(auth),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = json!({
            "error": message,
            "code": code,
        });
        (status, axum::Json(body)).into_response()
    }
}

/// Map an [`AuthError`] to an HTTP status, error code, and message.
///
/// Every session-validity reason collapses to the same 401 body; the
/// distinct reason is only ever logged.
fn classify_auth_error(err: &AuthError) -> (StatusCode, &'static str, String) {
    match err {
        AuthError::SessionNotFound
        | AuthError::SessionRevoked
        | AuthError::SessionExpired
        | AuthError::MalformedRefreshToken
        | AuthError::StaleRefreshToken => {
            tracing::debug!(reason = %err, "Refresh rejected");
            (
                StatusCode::UNAUTHORIZED,
                "INVALID_REFRESH_TOKEN",
                REFRESH_REJECTED_MESSAGE.to_string(),
            )
        }
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "Invalid credentials".to_string(),
        ),
        AuthError::InvalidAccessToken => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Invalid or expired token".to_string(),
        ),
        AuthError::AccountLocked => (
            StatusCode::FORBIDDEN,
            "ACCOUNT_LOCKED",
            "Account is temporarily locked. Try again later.".to_string(),
        ),
        AuthError::AccountDisabled => (
            StatusCode::FORBIDDEN,
            "ACCOUNT_DISABLED",
            "Account is deactivated".to_string(),
        ),
        AuthError::InvalidVerificationToken => (
            StatusCode::BAD_REQUEST,
            "INVALID_TOKEN",
            "Invalid or expired token".to_string(),
        ),
        AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        AuthError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        AuthError::IdentityProvider(msg) => {
            tracing::warn!(error = %msg, "Identity provider failure");
            (
                StatusCode::BAD_GATEWAY,
                "IDENTITY_PROVIDER_ERROR",
                "Sign-in with the identity provider failed".to_string(),
            )
        }
        AuthError::Transient(msg) => {
            tracing::warn!(error = %msg, "Transient failure");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service temporarily unavailable. Please retry.".to_string(),
            )
        }
        AuthError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal auth error");
            internal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_failures_share_one_response() {
        for err in [
            AuthError::SessionNotFound,
            AuthError::SessionRevoked,
            AuthError::SessionExpired,
            AuthError::MalformedRefreshToken,
            AuthError::StaleRefreshToken,
        ] {
            let (status, code, message) = AppError::from(err).parts();
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(code, "INVALID_REFRESH_TOKEN");
            assert_eq!(message, "Invalid refresh token. Please log in again.");
        }
    }

    #[test]
    fn transient_is_503() {
        let (status, code, _) = AppError::from(AuthError::Transient("timeout".into())).parts();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "SERVICE_UNAVAILABLE");
    }

    #[test]
    fn internal_details_are_hidden() {
        let (status, _, message) =
            AppError::from(AuthError::Internal("secret detail".into())).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("secret detail"));
    }

    #[test]
    fn core_not_found_is_404() {
        let err = AppError::Core(CoreError::NotFound {
            entity: "Session",
            id: "abc".to_string(),
        });
        assert_eq!(err.parts().0, StatusCode::NOT_FOUND);
    }
}
