//! The authentication façade used by the HTTP handlers.
//!
//! [`AuthService`] composes the credential verifier, the session manager
//! and the token codec. It produces tokens; deciding whether they travel
//! as cookies or in the response body is left to the handlers, driven by
//! [`ClientContext::client_type`].

use std::sync::Arc;
use std::time::Duration;

use agora_core::client::ClientType;
use agora_core::roles::ROLE_USER;
use agora_core::types::DbId;
use agora_db::models::session::Session;
use agora_db::models::user::{CreateUser, User, UserProfile};
use agora_db::models::verification_token::{CreateVerificationToken, TokenPurpose};
use chrono::Utc;
use serde::Deserialize;
use validator::ValidateEmail;

use super::codec::TokenCodec;
use super::credentials::CredentialVerifier;
use super::error::AuthError;
use super::mailer::{password_reset_email, verification_email, Mailer, OutgoingEmail};
use super::oauth::OAuthProfile;
use super::password::{hash_password_async, validate_password_strength};
use super::secrets::{generate_opaque_token, hash_token};
use super::session_manager::{RevokeBy, SessionManager, SessionMetadata};
use super::store::{with_deadline, UserStore, VerificationTokenStore};

/// Email-verification links stay valid for 24 hours.
const EMAIL_VERIFICATION_TTL_HOURS: i64 = 24;

/// Password-reset links stay valid for 1 hour.
const PASSWORD_RESET_TTL_HOURS: i64 = 1;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 30;

/// Who is calling and how they want their tokens delivered.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub client_type: ClientType,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl ClientContext {
    fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            user_agent: self.user_agent.clone(),
            ip_address: self.ip_address.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// An access token and refresh token issued together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
    /// Seconds until the session expires unless rotated.
    pub refresh_expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    verification_tokens: Arc<dyn VerificationTokenStore>,
    sessions: Arc<SessionManager>,
    credentials: CredentialVerifier,
    codec: Arc<TokenCodec>,
    mailer: Arc<dyn Mailer>,
    app_url: String,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        verification_tokens: Arc<dyn VerificationTokenStore>,
        sessions: Arc<SessionManager>,
        codec: Arc<TokenCodec>,
        mailer: Arc<dyn Mailer>,
        app_url: String,
        store_timeout: Duration,
    ) -> Self {
        Self {
            credentials: CredentialVerifier::new(users.clone(), store_timeout),
            users,
            verification_tokens,
            sessions,
            codec,
            mailer,
            app_url,
            store_timeout,
        }
    }

    // -----------------------------------------------------------------------
    // Registration and login
    // -----------------------------------------------------------------------

    /// Create an account, send the verification email and log the user in.
    pub async fn register(
        &self,
        input: RegisterInput,
        ctx: &ClientContext,
    ) -> Result<AuthOutcome, AuthError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();
        validate_username(&username)?;
        if !email.validate_email() {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }
        validate_password_strength(&input.password)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict("Email already registered".to_string()));
        }
        if with_deadline(
            self.store_timeout,
            "find_user_by_username",
            self.users.find_by_username(&username),
        )
        .await?
        .is_some()
        {
            return Err(AuthError::Conflict("Username already taken".to_string()));
        }

        let password_hash = hash_password_async(input.password).await?;
        let user = with_deadline(
            self.store_timeout,
            "create_user",
            self.users.create(&CreateUser {
                username,
                email,
                password_hash: Some(password_hash),
                role: ROLE_USER.to_string(),
                email_verified: false,
            }),
        )
        .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");

        self.send_verification(&user).await;
        self.issue(&user, ctx).await
    }

    /// Verify credentials and open a new session.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        ctx: &ClientContext,
    ) -> Result<AuthOutcome, AuthError> {
        let user = self.credentials.verify(identifier, password).await?;
        tracing::info!(user_id = user.id, client_type = ?ctx.client_type, "User logged in");
        self.issue(&user, ctx).await
    }

    /// Log in a user vouched for by the identity provider, creating a
    /// verified, password-less account on first sight.
    pub async fn oauth_login(
        &self,
        profile: OAuthProfile,
        ctx: &ClientContext,
    ) -> Result<AuthOutcome, AuthError> {
        let user = match self.find_by_email(&profile.email).await? {
            Some(mut user) => {
                if !user.email_verified {
                    self.claim_unverified_account(&user).await?;
                    user.email_verified = true;
                    user.password_hash = None;
                }
                user
            }
            None => self.create_oauth_user(&profile).await?,
        };

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        with_deadline(
            self.store_timeout,
            "record_successful_login",
            self.users.record_successful_login(user.id),
        )
        .await?;

        tracing::info!(
            user_id = user.id,
            provider_user_id = %profile.provider_user_id,
            "User logged in with Google"
        );
        self.issue(&user, ctx).await
    }

    /// The provider proved ownership of an address someone registered
    /// without verifying. Whoever chose that password is locked out: the
    /// hash is dropped and every existing session is revoked.
    async fn claim_unverified_account(&self, user: &User) -> Result<(), AuthError> {
        with_deadline(
            self.store_timeout,
            "clear_password",
            self.users.clear_password(user.id),
        )
        .await?;
        let revoked = self.sessions.revoke_all_for_user(user.id).await?;
        with_deadline(
            self.store_timeout,
            "mark_email_verified",
            self.users.mark_email_verified(user.id),
        )
        .await?;
        tracing::warn!(
            user_id = user.id,
            revoked_sessions = revoked,
            "Unverified account claimed through Google; password removed"
        );
        Ok(())
    }

    async fn create_oauth_user(&self, profile: &OAuthProfile) -> Result<User, AuthError> {
        let base = username_base(&profile.email);
        let mut username = base.clone();
        let mut suffix = 1;
        while with_deadline(
            self.store_timeout,
            "find_user_by_username",
            self.users.find_by_username(&username),
        )
        .await?
        .is_some()
        {
            username = format!("{base}{suffix}");
            suffix += 1;
        }

        let user = with_deadline(
            self.store_timeout,
            "create_user",
            self.users.create(&CreateUser {
                username,
                email: profile.email.clone(),
                password_hash: None,
                role: ROLE_USER.to_string(),
                email_verified: true,
            }),
        )
        .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User created from Google profile");
        Ok(user)
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Exchange a refresh token for a new token pair on the same session.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthOutcome, AuthError> {
        let identity = self.sessions.verify_and_consume(refresh_token).await?;

        if !identity.user.is_active {
            self.sessions
                .revoke(RevokeBy::SessionId(identity.session_id.clone()))
                .await?;
            return Err(AuthError::AccountDisabled);
        }

        let issued = self
            .sessions
            .rotate(&identity.session_id, identity.version)
            .await?;
        let tokens = self.token_pair(&identity.user, issued.session_id, issued.refresh_token, issued.expires_at)?;

        tracing::debug!(user_id = identity.user.id, session_id = %tokens.session_id, "Tokens refreshed");

        Ok(AuthOutcome {
            user: UserProfile::from(&identity.user),
            tokens,
        })
    }

    /// Best-effort revocation of the session behind `refresh_token`. Never fails.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let Some(token) = refresh_token.filter(|t| !t.is_empty()) else {
            tracing::debug!("Logout without refresh token");
            return;
        };

        match self.sessions.revoke(RevokeBy::Token(token.to_string())).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!("Logout for unknown or already revoked session"),
            Err(e) if e.is_session_failure() => {
                tracing::debug!(reason = %e, "Logout with unusable refresh token")
            }
            Err(e) => tracing::warn!(error = %e, "Logout revocation failed"),
        }
    }

    pub async fn logout_all(&self, user_id: DbId) -> Result<u64, AuthError> {
        self.sessions.revoke_all_for_user(user_id).await
    }

    pub async fn list_sessions(&self, user_id: DbId) -> Result<Vec<Session>, AuthError> {
        self.sessions.list_active(user_id).await
    }

    /// Revoke the listed sessions owned by `user_id`. Returns how many were revoked.
    pub async fn revoke_sessions(
        &self,
        user_id: DbId,
        session_ids: &[String],
    ) -> Result<u64, AuthError> {
        if session_ids.is_empty() {
            return Ok(0);
        }
        self.sessions.revoke_selected(user_id, session_ids).await
    }

    pub async fn current_user(&self, user_id: DbId) -> Result<UserProfile, AuthError> {
        let user = with_deadline(self.store_timeout, "find_user", self.users.find_by_id(user_id))
            .await?
            .ok_or(AuthError::InvalidAccessToken)?;
        Ok(UserProfile::from(&user))
    }

    // -----------------------------------------------------------------------
    // Email verification and password reset
    // -----------------------------------------------------------------------

    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        let user_id = self
            .consume_token(token, TokenPurpose::EmailVerification)
            .await?;
        with_deadline(
            self.store_timeout,
            "mark_email_verified",
            self.users.mark_email_verified(user_id),
        )
        .await?;
        tracing::info!(user_id, "Email verified");
        Ok(())
    }

    /// Send a reset link if the address belongs to an active account.
    ///
    /// Always succeeds so the response cannot be used to probe for accounts.
    pub async fn forgot_password(&self, email: &str) {
        let email = email.trim().to_lowercase();
        let user = match self.find_by_email(&email).await {
            Ok(Some(user)) if user.is_active => user,
            Ok(_) => {
                tracing::debug!("Password reset requested for unknown or inactive account");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Password reset lookup failed");
                return;
            }
        };

        match self
            .issue_token(user.id, TokenPurpose::PasswordReset, PASSWORD_RESET_TTL_HOURS)
            .await
        {
            Ok(token) => {
                let email = password_reset_email(&self.app_url, &user.email, &user.username, &token);
                self.deliver(user.id, email).await;
            }
            Err(e) => tracing::warn!(user_id = user.id, error = %e, "Could not issue reset token"),
        }
    }

    /// Set a new password and revoke every session of the account.
    pub async fn reset_password(&self, token: &str, new_password: String) -> Result<(), AuthError> {
        validate_password_strength(&new_password)?;
        let user_id = self.consume_token(token, TokenPurpose::PasswordReset).await?;

        let hash = hash_password_async(new_password).await?;
        with_deadline(
            self.store_timeout,
            "update_password",
            self.users.update_password(user_id, &hash),
        )
        .await?;
        let revoked = self.sessions.revoke_all_for_user(user_id).await?;

        tracing::info!(user_id, revoked_sessions = revoked, "Password reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn issue(&self, user: &User, ctx: &ClientContext) -> Result<AuthOutcome, AuthError> {
        let issued = self
            .sessions
            .create_session(user.id, ctx.metadata())
            .await?;
        let tokens = self.token_pair(user, issued.session_id, issued.refresh_token, issued.expires_at)?;
        Ok(AuthOutcome {
            user: UserProfile::from(user),
            tokens,
        })
    }

    fn token_pair(
        &self,
        user: &User,
        session_id: String,
        refresh_token: String,
        expires_at: chrono::DateTime<Utc>,
    ) -> Result<TokenPair, AuthError> {
        let access_token =
            self.codec
                .mint_access_token(user.id, &user.email, &user.role, &session_id)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            session_id,
            expires_in: self.codec.access_ttl().num_seconds(),
            refresh_expires_in: (expires_at - Utc::now()).num_seconds().max(0),
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        with_deadline(
            self.store_timeout,
            "find_user_by_email",
            self.users.find_by_email(email),
        )
        .await
    }

    async fn send_verification(&self, user: &User) {
        match self
            .issue_token(user.id, TokenPurpose::EmailVerification, EMAIL_VERIFICATION_TTL_HOURS)
            .await
        {
            Ok(token) => {
                let email = verification_email(&self.app_url, &user.email, &user.username, &token);
                self.deliver(user.id, email).await;
            }
            Err(e) => {
                tracing::warn!(user_id = user.id, error = %e, "Could not issue verification token")
            }
        }
    }

    /// Persist the hash of a fresh token and return the plaintext.
    async fn issue_token(
        &self,
        user_id: DbId,
        purpose: TokenPurpose,
        ttl_hours: i64,
    ) -> Result<String, AuthError> {
        let token = generate_opaque_token();
        with_deadline(
            self.store_timeout,
            "create_verification_token",
            self.verification_tokens.create(&CreateVerificationToken {
                user_id,
                token_hash: hash_token(&token),
                purpose,
                expires_at: Utc::now() + chrono::Duration::hours(ttl_hours),
            }),
        )
        .await?;
        Ok(token)
    }

    /// Redeem a single-use token, returning its owner.
    async fn consume_token(&self, token: &str, purpose: TokenPurpose) -> Result<DbId, AuthError> {
        let record = with_deadline(
            self.store_timeout,
            "find_verification_token",
            self.verification_tokens
                .find_valid(&hash_token(token.trim()), purpose),
        )
        .await?
        .ok_or(AuthError::InvalidVerificationToken)?;

        let consumed = with_deadline(
            self.store_timeout,
            "mark_verification_token_used",
            self.verification_tokens.mark_used(record.id),
        )
        .await?;
        if !consumed {
            return Err(AuthError::InvalidVerificationToken);
        }
        Ok(record.user_id)
    }

    async fn deliver(&self, user_id: DbId, email: OutgoingEmail) {
        let subject = email.subject.clone();
        if let Err(e) = self.mailer.send(email).await {
            tracing::warn!(user_id, subject = %subject, error = %e, "Email delivery failed");
        }
    }
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AuthError::Validation(format!(
            "Username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(AuthError::Validation(
            "Username may only contain letters, digits, '.', '_' and '-'".to_string(),
        ));
    }
    if username.contains('@') {
        return Err(AuthError::Validation("Username must not contain '@'".to_string()));
    }
    Ok(())
}

/// Username candidate from an email's local part: lowercase, restricted to
/// the username alphabet, padded or truncated to fit the length bounds.
fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .map(|c| c.to_ascii_lowercase())
        .take(USERNAME_MAX_LEN - 4)
        .collect();
    if base.chars().count() < USERNAME_MIN_LEN {
        base.insert_str(0, "user");
    }
    base
}
