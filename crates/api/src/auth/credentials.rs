//! Login-credential verification with account lockout.

use std::sync::Arc;
use std::time::Duration;

use agora_db::models::user::User;
use chrono::Utc;

use super::error::AuthError;
use super::password::verify_password_async;
use super::store::{with_deadline, UserStore};

/// Consecutive failed attempts before the account is locked.
pub const MAX_FAILED_ATTEMPTS: i32 = 5;

/// Lock duration once [`MAX_FAILED_ATTEMPTS`] is reached.
pub const LOCK_DURATION_MINS: i64 = 15;

pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    store_timeout: Duration,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserStore>, store_timeout: Duration) -> Self {
        Self {
            users,
            store_timeout,
        }
    }

    /// Resolve `identifier` (an email if it contains `@`, otherwise a
    /// username) and check `password` against the stored hash.
    ///
    /// Unknown users, password-less accounts and wrong passwords all fail
    /// with the same [`AuthError::InvalidCredentials`], whatever the state
    /// of the account. Locked and disabled accounts are reported only once
    /// the password has been checked.
    pub async fn verify(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        let identifier = identifier.trim();
        let lookup = if identifier.contains('@') {
            let email = identifier.to_lowercase();
            with_deadline(
                self.store_timeout,
                "find_user_by_email",
                self.users.find_by_email(&email),
            )
            .await?
        } else {
            with_deadline(
                self.store_timeout,
                "find_user_by_username",
                self.users.find_by_username(identifier),
            )
            .await?
        };

        let Some(user) = lookup else {
            tracing::debug!("Login attempt for unknown identifier");
            return Err(AuthError::InvalidCredentials);
        };

        let Some(hash) = user.password_hash.clone() else {
            tracing::debug!(user_id = user.id, "Password login attempted on OAuth-only account");
            return Err(AuthError::InvalidCredentials);
        };

        let locked = user.locked_until.is_some_and(|until| until > Utc::now());

        // Account state is only revealed to callers who know the password.
        if !verify_password_async(password.to_string(), hash).await? {
            if locked {
                tracing::debug!(user_id = user.id, "Wrong password on locked account");
            } else {
                self.record_failure(&user).await?;
            }
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        if locked {
            tracing::warn!(user_id = user.id, "Login attempt on locked account");
            return Err(AuthError::AccountLocked);
        }

        with_deadline(
            self.store_timeout,
            "record_successful_login",
            self.users.record_successful_login(user.id),
        )
        .await?;

        Ok(user)
    }

    async fn record_failure(&self, user: &User) -> Result<(), AuthError> {
        let failures = with_deadline(
            self.store_timeout,
            "record_failed_login",
            self.users.record_failed_login(user.id),
        )
        .await?;

        if failures >= MAX_FAILED_ATTEMPTS {
            let until = Utc::now() + chrono::Duration::minutes(LOCK_DURATION_MINS);
            with_deadline(
                self.store_timeout,
                "lock_account",
                self.users.lock_account(user.id, until),
            )
            .await?;
            tracing::warn!(user_id = user.id, failures, locked_until = %until, "Account locked");
        } else {
            tracing::debug!(user_id = user.id, failures, "Failed login recorded");
        }
        Ok(())
    }
}
