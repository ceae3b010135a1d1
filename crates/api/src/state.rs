use std::sync::Arc;
use std::time::Duration;

use crate::auth::codec::TokenCodec;
use crate::auth::cookies::CookiePolicy;
use crate::auth::denylist::RevokedSessions;
use crate::auth::mailer::Mailer;
use crate::auth::oauth::GoogleOAuthClient;
use crate::auth::service::AuthService;
use crate::auth::session_manager::{SessionManager, SessionPolicy};
use crate::auth::store::Stores;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Copy`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub auth: Arc<AuthService>,
    pub sessions: Arc<SessionManager>,
    pub codec: Arc<TokenCodec>,
    pub cookies: CookiePolicy,
    /// `None` when Google sign-in is not configured.
    pub google: Option<Arc<GoogleOAuthClient>>,
}

impl AppState {
    /// Wire the auth components over `stores`.
    pub fn new(config: ServerConfig, stores: Stores, mailer: Arc<dyn Mailer>) -> Self {
        let codec = Arc::new(TokenCodec::new(&config.jwt));
        let store_timeout = config.store_timeout();

        // Denylist entries only need to outlive the access tokens they block.
        let access_ttl = config
            .jwt
            .access_ttl
            .to_std()
            .unwrap_or(Duration::from_secs(15 * 60));
        let revoked = Arc::new(RevokedSessions::new(access_ttl));

        let sessions = Arc::new(SessionManager::new(
            stores.sessions.clone(),
            stores.users.clone(),
            codec.clone(),
            revoked,
            SessionPolicy {
                refresh_lifetime: config.jwt.refresh_ttl,
                store_timeout,
            },
        ));

        let auth = Arc::new(AuthService::new(
            stores.users,
            stores.verification_tokens,
            sessions.clone(),
            codec.clone(),
            mailer,
            config.app_url.clone(),
            store_timeout,
        ));

        let google = config
            .google
            .clone()
            .map(|google| Arc::new(GoogleOAuthClient::new(google)));

        Self {
            cookies: CookiePolicy {
                secure: config.is_production(),
            },
            config: Arc::new(config),
            auth,
            sessions,
            codec,
            google,
        }
    }
}
