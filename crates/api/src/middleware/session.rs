//! Cookie session layer and its stores.
//!
//! Deployed environments persist sessions in the `session` table; local
//! development keeps them in memory.

use sha2::{Digest, Sha512};
use time::Duration as CookieDuration;
use tokio::task::JoinHandle;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::session_store::ExpiredDeletion;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::SessionConfig;
use nashstash_db::DbPool;

pub const SESSION_COOKIE_NAME: &str = "connect.sid";

pub const SESSION_SCHEMA: &str = "public";
pub const SESSION_TABLE: &str = "session";

/// How often expired rows are deleted from [`SESSION_TABLE`].
pub const EXPIRED_SESSION_CLEANUP_INTERVAL: std::time::Duration =
    std::time::Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("Invalid session table name: {0}")]
    InvalidName(String),
}

/// Derive the 64-byte cookie signing key from an arbitrary-length secret.
pub fn session_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Signed, httpOnly, `SameSite=Lax` session cookie with inactivity expiry.
pub fn session_layer<S>(store: S, config: &SessionConfig) -> SessionManagerLayer<S, SignedCookie>
where
    S: SessionStore + Clone,
{
    let max_age = CookieDuration::seconds(config.max_age.as_secs().try_into().unwrap_or(i64::MAX));

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(config.secure)
        .with_expiry(Expiry::OnInactivity(max_age))
        .with_signed(session_key(&config.secret))
}

/// Postgres-backed store over `public.session`.
///
/// The table is created by the database migrations rather than
/// `PostgresStore::migrate`, which issues `CREATE SCHEMA` and so needs
/// database-level privileges the app role may not have.
pub fn postgres_store(pool: &DbPool) -> Result<PostgresStore, SessionStoreError> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name(SESSION_SCHEMA)
        .and_then(|store| store.with_table_name(SESSION_TABLE))
        .map_err(SessionStoreError::InvalidName)?;
    tracing::info!(schema = SESSION_SCHEMA, table = SESSION_TABLE, "Session store ready");
    Ok(store)
}

/// Spawn the task deleting expired sessions every
/// [`EXPIRED_SESSION_CLEANUP_INTERVAL`].
pub fn spawn_expired_session_cleanup(store: PostgresStore) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = store
            .continuously_delete_expired(EXPIRED_SESSION_CLEANUP_INTERVAL)
            .await
        {
            tracing::error!(error = %e, "Expired session cleanup stopped");
        }
    })
}
