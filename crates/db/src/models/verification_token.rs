//! Single-use email tokens (address verification, password reset).

use agora_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// What a verification token may be redeemed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }
}

/// A row from the `verification_tokens` table.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub id: DbId,
    pub user_id: DbId,
    pub token_hash: String,
    pub purpose: String,
    pub expires_at: Timestamp,
    pub used_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for issuing a new token.
#[derive(Debug, Clone)]
pub struct CreateVerificationToken {
    pub user_id: DbId,
    pub token_hash: String,
    pub purpose: TokenPurpose,
    pub expires_at: Timestamp,
}
