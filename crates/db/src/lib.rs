//! PostgreSQL persistence for users, sessions and verification tokens.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
///
/// `acquire_timeout` bounds how long a request waits for a free connection,
/// so a saturated pool surfaces as an error instead of a hung request.
pub async fn create_pool(database_url: &str, acquire_timeout: Duration) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;
    tracing::debug!(max_connections = 20, "PostgreSQL pool connected");
    Ok(pool)
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
