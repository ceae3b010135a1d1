use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agora_api::auth::mailer::{LogMailer, Mailer, SmtpMailer};
use agora_api::auth::store::Stores;
use agora_api::background;
use agora_api::config::ServerConfig;
use agora_api::router::build_app_router;
use agora_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agora_api=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        app_env = %config.app_env,
        google_sign_in = config.google.is_some(),
        "Loaded server configuration"
    );

    // --- Store ---
    let stores = match &config.database_url {
        Some(database_url) => {
            let pool = agora_db::create_pool(database_url, config.store_timeout())
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            agora_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            agora_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Stores::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Stores::memory()
        }
    };

    // --- Mailer ---
    let mailer: Arc<dyn Mailer> = match config.smtp.clone() {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).expect("Invalid SMTP configuration")),
        None => {
            tracing::info!("SMTP not configured, emails will be logged");
            Arc::new(LogMailer)
        }
    };

    // --- App state ---
    let state = AppState::new(config.clone(), stores, mailer);

    // --- Session cleanup ---
    let cleanup_cancel = CancellationToken::new();
    let cleanup_handle = tokio::spawn(background::session_cleanup::run(
        Arc::clone(&state.sessions),
        Duration::from_secs(config.session_cleanup_interval_secs),
        cleanup_cancel.clone(),
    ));

    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cleanup_cancel.cancel();
    let _ = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        cleanup_handle,
    )
    .await;
    tracing::info!("Session cleanup job stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
