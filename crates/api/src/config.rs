use std::time::Duration;

use crate::auth::codec::JwtConfig;
use crate::auth::mailer::SmtpConfig;
use crate::auth::oauth::GoogleOAuthConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// `production` enables `Secure; SameSite=None` cookies.
    pub app_env: String,
    /// Frontend base URL used in email links.
    pub app_url: String,
    /// PostgreSQL URL. `None` runs on the in-memory store.
    pub database_url: Option<String>,
    /// Deadline for each individual store call (default: `5000`).
    pub store_timeout_ms: u64,
    /// Period of the expired-session sweep (default: `3600`).
    pub session_cleanup_interval_secs: u64,
    /// JWT token configuration (secret, lifetimes).
    pub jwt: JwtConfig,
    /// Google sign-in; `None` disables the `/auth/google` routes.
    pub google: Option<GoogleOAuthConfig>,
    /// SMTP relay; `None` logs emails instead of sending them.
    pub smtp: Option<SmtpConfig>,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `HOST`                          | `0.0.0.0`               |
    /// | `PORT`                          | `3000`                  |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`         | `30`                    |
    /// | `APP_ENV`                       | `development`           |
    /// | `APP_URL`                       | `http://localhost:5173` |
    /// | `DATABASE_URL`                  | unset (in-memory store) |
    /// | `STORE_TIMEOUT_MS`              | `5000`                  |
    /// | `SESSION_CLEANUP_INTERVAL_SECS` | `3600`                  |
    ///
    /// JWT, Google and SMTP settings are read by [`JwtConfig::from_env`],
    /// [`GoogleOAuthConfig::from_env`] and [`SmtpConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics on unparseable numbers and when `JWT_SECRET` is missing.
    pub fn from_env() -> Self {
        let port: u16 = env_or("PORT", "3000")
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = env_or("SHUTDOWN_TIMEOUT_SECS", "30")
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let store_timeout_ms: u64 = env_or("STORE_TIMEOUT_MS", "5000")
            .parse()
            .expect("STORE_TIMEOUT_MS must be a valid u64");

        let session_cleanup_interval_secs: u64 = env_or("SESSION_CLEANUP_INTERVAL_SECS", "3600")
            .parse()
            .expect("SESSION_CLEANUP_INTERVAL_SECS must be a valid u64");

        Self {
            host: env_or("HOST", "0.0.0.0"),
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            app_env: env_or("APP_ENV", "development"),
            app_url: env_or("APP_URL", "http://localhost:5173"),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            store_timeout_ms,
            session_cleanup_interval_secs,
            jwt: JwtConfig::from_env(),
            google: GoogleOAuthConfig::from_env(),
            smtp: SmtpConfig::from_env(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
