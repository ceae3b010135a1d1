//! Failure taxonomy for the authentication subsystem.

use super::store::StoreError;

/// Message returned for every refresh-token failure, whatever the cause.
pub const REFRESH_REJECTED_MESSAGE: &str = "Invalid refresh token. Please log in again.";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown identifier, wrong password, or a password-less (OAuth) account.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is temporarily locked")]
    AccountLocked,

    #[error("account is deactivated")]
    AccountDisabled,

    #[error("session not found")]
    SessionNotFound,

    #[error("session revoked")]
    SessionRevoked,

    #[error("session expired")]
    SessionExpired,

    #[error("malformed refresh token")]
    MalformedRefreshToken,

    /// The token's version no longer matches the session: it was already
    /// exchanged, or a concurrent refresh won the rotation.
    #[error("refresh token already exchanged")]
    StaleRefreshToken,

    #[error("invalid access token")]
    InvalidAccessToken,

    #[error("invalid or expired verification token")]
    InvalidVerificationToken,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("identity provider error: {0}")]
    IdentityProvider(String),

    /// Store unavailable or deadline exceeded; the caller may retry.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// `true` for the reasons that must collapse into [`REFRESH_REJECTED_MESSAGE`].
    pub fn is_session_failure(&self) -> bool {
        matches!(
            self,
            AuthError::SessionNotFound
                | AuthError::SessionRevoked
                | AuthError::SessionExpired
                | AuthError::MalformedRefreshToken
                | AuthError::StaleRefreshToken
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Transient(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AuthError::Conflict(msg),
            other => AuthError::Transient(other.to_string()),
        }
    }
}
