//! Google OAuth 2.0 authorization-code flow.
//!
//! Only the two outbound calls live here: building the consent URL and
//! exchanging the returned code for a verified profile. State-cookie
//! handling is the HTTP layer's job; account linking is
//! [`AuthService::oauth_login`](super::service::AuthService::oauth_login).

use reqwest::{Client as HttpClient, Url};
use serde::Deserialize;

use super::error::AuthError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Identity returned by the provider after a successful code exchange.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider_user_id: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl GoogleOAuthConfig {
    /// `None` unless all of `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET` and
    /// `GOOGLE_REDIRECT_URI` are set.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            client_id: std::env::var("GOOGLE_CLIENT_ID").ok()?,
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET").ok()?,
            redirect_uri: std::env::var("GOOGLE_REDIRECT_URI").ok()?,
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

pub struct GoogleOAuthClient {
    config: GoogleOAuthConfig,
    http: HttpClient,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleOAuthConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    /// Consent-screen URL carrying `state` for CSRF protection.
    pub fn authorization_url(&self, state: &str) -> Result<Url, AuthError> {
        Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| AuthError::Internal(format!("invalid authorization URL: {e}")))
    }

    /// Exchange an authorization code for the user's profile.
    ///
    /// Fails with [`AuthError::IdentityProvider`] if either call fails or the
    /// account has no verified email.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthProfile, AuthError> {
        let token: TokenResponse = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::IdentityProvider(format!("token exchange failed: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::IdentityProvider(format!("invalid token response: {e}")))?;

        let info: GoogleUserInfo = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::IdentityProvider(format!("userinfo request failed: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::IdentityProvider(format!("invalid userinfo response: {e}")))?;

        profile_from_userinfo(info)
    }
}

fn profile_from_userinfo(info: GoogleUserInfo) -> Result<OAuthProfile, AuthError> {
    match info.email {
        Some(email) if info.email_verified => Ok(OAuthProfile {
            provider_user_id: info.sub,
            email: email.to_lowercase(),
            name: info.name,
        }),
        _ => Err(AuthError::IdentityProvider(
            "Google account has no verified email".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn client() -> GoogleOAuthClient {
        GoogleOAuthClient::new(GoogleOAuthConfig {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3000/api/v1/auth/google/callback".to_string(),
        })
    }

    #[test]
    fn authorization_url_carries_state_and_redirect() {
        let url = client().authorization_url("state-xyz").unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));

        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| params.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("state"), Some("state-xyz"));
        assert_eq!(get("client_id"), Some("client-123"));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(
            get("redirect_uri"),
            Some("http://localhost:3000/api/v1/auth/google/callback")
        );
    }

    #[test]
    fn unverified_email_is_refused() {
        let info = GoogleUserInfo {
            sub: "1".to_string(),
            email: Some("x@example.com".to_string()),
            email_verified: false,
            name: None,
        };
        assert_matches!(profile_from_userinfo(info), Err(AuthError::IdentityProvider(_)));
    }

    #[test]
    fn verified_email_is_normalized() {
        let info = GoogleUserInfo {
            sub: "42".to_string(),
            email: Some("Bob@Example.com".to_string()),
            email_verified: true,
            name: Some("Bob".to_string()),
        };
        let profile = profile_from_userinfo(info).unwrap();
        assert_eq!(profile.email, "bob@example.com");
        assert_eq!(profile.provider_user_id, "42");
    }
}
