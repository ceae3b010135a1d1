//! Access-token signing/validation and refresh-token encoding.
//!
//! Access tokens are HS256-signed JWTs containing an [`AccessClaims`]
//! payload; they are stateless and valid until `exp`. Refresh tokens are
//! unsigned carriers: base64url JSON naming a session and the session
//! version they were minted for. Whether that session is still usable is
//! decided by the session store, never by the token itself.

use agora_core::lifetime::{default_access_ttl, default_refresh_lifetime, parse_lifetime};
use agora_core::types::DbId;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AuthError;

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    pub email: String,
    /// The user's role name (`"admin"` or `"user"`).
    pub role: String,
    /// Session the token was issued for; consulted against the revocation denylist.
    pub sid: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier (UUID v4) for audit.
    pub jti: String,
}

/// Decoded contents of a refresh token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RefreshTokenPayload {
    /// Opaque session identifier.
    pub sid: String,
    /// Issued-at time in Unix milliseconds.
    pub ts: i64,
    /// Session version at mint time.
    pub v: i32,
}

/// Configuration for token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify access tokens.
    pub secret: String,
    /// Access token lifetime.
    pub access_ttl: Duration,
    /// Session (refresh token) lifetime.
    pub refresh_ttl: Duration,
}

impl JwtConfig {
    /// Load token configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_EXPIRES_IN`           | no       | `15m`   |
    /// | `REFRESH_TOKEN_EXPIRES_IN` | no       | `7d`    |
    ///
    /// Unparseable lifetimes fall back to the defaults (see
    /// [`parse_lifetime`]).
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_ttl = std::env::var("JWT_EXPIRES_IN")
            .map(|v| parse_lifetime(&v, default_access_ttl()))
            .unwrap_or_else(|_| default_access_ttl());

        let refresh_ttl = std::env::var("REFRESH_TOKEN_EXPIRES_IN")
            .map(|v| parse_lifetime(&v, default_refresh_lifetime()))
            .unwrap_or_else(|_| default_refresh_lifetime());

        Self {
            secret,
            access_ttl,
            refresh_ttl,
        }
    }
}

/// Stateless token transformations. Holds the process-wide signing keys.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation: Validation::default(), // HS256, validates exp
            access_ttl: config.access_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Sign an HS256 access token for the given user and session.
    pub fn mint_access_token(
        &self,
        user_id: DbId,
        email: &str,
        role: &str,
        session_id: &str,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user_id,
            email: email.to_string(),
            role: role.to_string(),
            sid: session_id.to_string(),
            exp: now + self.access_ttl.num_seconds(),
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Token generation error: {e}")))
    }

    /// Validate signature and expiry, returning the embedded [`AccessClaims`].
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                AuthError::InvalidAccessToken
            })
    }

    /// Encode a refresh token naming `session_id` at `version`.
    pub fn mint_refresh_token(&self, session_id: &str, version: i32) -> String {
        let payload = RefreshTokenPayload {
            sid: session_id.to_string(),
            ts: Utc::now().timestamp_millis(),
            v: version,
        };
        // Serializing a struct of plain strings and integers cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a refresh token without consulting any store.
    ///
    /// Fails with [`AuthError::MalformedRefreshToken`] on bad base64, bad
    /// JSON, missing fields, or an empty session id.
    pub fn decode_refresh_token(&self, token: &str) -> Result<RefreshTokenPayload, AuthError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| AuthError::MalformedRefreshToken)?;
        let payload: RefreshTokenPayload =
            serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedRefreshToken)?;
        if payload.sid.is_empty() {
            return Err(AuthError::MalformedRefreshToken);
        }
        Ok(payload)
    }
}
