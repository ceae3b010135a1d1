//! Argon2id password hashing.
//!
//! Hashes are stored as PHC strings, so the parameters and salt travel with
//! the hash. Hashing is CPU-bound; the async wrappers move it onto the
//! blocking pool so request workers are not stalled.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use super::error::AuthError;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// `Ok(false)` on mismatch; `Err` only if the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    Ok(())
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_async(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_async(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("verification task failed: {e}")))?
        .map_err(|e| AuthError::Internal(format!("stored password hash is invalid: {e}")))
}
