//! PostgreSQL access for the Nash Stash backend.
//!
//! Owns the connection pool lifecycle (configure, connect with retry,
//! health check, migrate, close) and the repository layer.

use std::time::Duration;

use nashstash_core::retry::RetryPolicy;
use sqlx::postgres::PgPoolOptions;

pub mod config;
pub mod models;
pub mod repositories;

pub use config::{DbConfig, DbConfigError, DbTarget};

pub type DbPool = sqlx::PgPool;

/// Connection attempts made by [`initialize`] before giving up.
pub const CONNECT_RETRY: RetryPolicy = RetryPolicy::fixed(5, Duration::from_secs(2));

/// Build the pool and verify connectivity, retrying per [`CONNECT_RETRY`].
///
/// The pool itself is created lazily; each attempt checks out a connection
/// and runs a trivial query, so a failed attempt means the database is
/// actually unreachable rather than merely misconfigured.
pub async fn initialize(config: &DbConfig) -> Result<DbPool, sqlx::Error> {
    let pool = create_pool(config)?;

    let target = config.describe_target();
    tracing::info!(%target, database = %config.database, "Connecting to database");

    connect_with_retry(&pool, &CONNECT_RETRY).await?;
    tracing::info!("Database connection established");

    Ok(pool)
}

/// Create a lazily-connecting pool with the configured limits.
pub fn create_pool(config: &DbConfig) -> Result<DbPool, sqlx::Error> {
    let options = config.connect_options()?;

    Ok(PgPoolOptions::new()
        .max_connections(config.max_connections)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .connect_lazy_with(options))
}

/// Run [`health_check`] under `policy` until it succeeds.
pub async fn connect_with_retry(pool: &DbPool, policy: &RetryPolicy) -> Result<(), sqlx::Error> {
    policy
        .run("database connection", |_| health_check(pool))
        .await
}

/// Check out a connection and run `SELECT NOW()`.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT NOW()").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations in `migrations/`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Close every connection in the pool. Idempotent.
pub async fn close(pool: &DbPool) {
    if !pool.is_closed() {
        pool.close().await;
        tracing::info!("Database pool closed");
    }
}
