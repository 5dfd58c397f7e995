//! Server bootstrap and lifecycle.
//!
//! [`Application::build`] runs the whole startup sequence (secrets,
//! database, Firebase, session store, router, bind) and
//! [`Application::run_until`] serves until the shutdown future resolves,
//! then tears everything down.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use nashstash_cloud::firebase::FirebaseAdmin;
use nashstash_cloud::secrets;
use nashstash_core::retry::RetryPolicy;
use nashstash_core::settings::Settings;
use nashstash_db::{DbConfig, DbConfigError};
use tokio::net::TcpListener;
use tower_sessions::MemoryStore;
use tower_sessions_sqlx_store::PostgresStore;

use crate::auth::StrategyRegistry;
use crate::config::{ConfigError, ServerConfig};
use crate::middleware::session::{self, SessionStoreError};
use crate::router::build_app_router;
use crate::state::AppState;
use crate::ws;

/// One initial attempt plus three retries, five seconds apart.
pub const STARTUP_RETRY: RetryPolicy = RetryPolicy::fixed(4, Duration::from_secs(5));

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database configuration error: {0}")]
    DbConfig(#[from] DbConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session store error: {0}")]
    SessionStore(#[from] SessionStoreError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// A bound, ready-to-serve server.
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
    session_store: Option<PostgresStore>,
}

impl Application {
    /// Run the startup sequence once.
    pub async fn build(mut settings: Settings) -> Result<Self, StartupError> {
        let environment = settings.environment();
        tracing::info!(%environment, "Starting Nash Stash server");

        let report = secrets::initialize_secrets(&mut settings).await;
        let failed = report.failed_keys();
        if !failed.is_empty() {
            tracing::warn!(?failed, "Continuing without some secrets");
        }

        let config = ServerConfig::from_settings(&settings)?;

        let db_config = DbConfig::from_settings(&settings)?;
        let pool = nashstash_db::initialize(&db_config).await?;
        nashstash_db::run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");

        let firebase = FirebaseAdmin::initialize(&settings);
        let strategies = StrategyRegistry::from_settings(&settings);
        let state = AppState::new(pool, config, strategies, firebase);

        let (router, session_store) = if environment.is_deployed() {
            let store = session::postgres_store(&state.pool)?;
            (build_app_router(state.clone(), store.clone()), Some(store))
        } else {
            tracing::info!("Using in-memory session store");
            (build_app_router(state.clone(), MemoryStore::default()), None)
        };

        let addr = format!("{}:{}", state.config.host, state.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })?;

        tracing::info!(
            port = state.config.port,
            %environment,
            firebase = state.firebase.is_some(),
            "Nash Stash server listening",
        );

        Ok(Self {
            listener,
            router,
            state,
            session_store,
        })
    }

    /// Build with [`STARTUP_RETRY`]: the whole sequence is repeated on
    /// failure and the last error is returned once attempts run out.
    pub async fn build_with_retry(settings: Settings) -> Result<Self, StartupError> {
        STARTUP_RETRY
            .run("server startup", |_| Self::build(settings.clone()))
            .await
    }

    /// Serve until `shutdown` resolves, then close sockets, stop background
    /// tasks and close the pool.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            router,
            state,
            session_store,
        } = self;

        let heartbeat = ws::start_heartbeat(state.ws_manager.clone());
        let cleanup = session_store.map(session::spawn_expired_session_cleanup);

        // Sockets are closed as soon as the signal arrives so the graceful
        // drain does not wait on them.
        let ws_manager = state.ws_manager.clone();
        let signal = async move {
            shutdown.await;
            let count = ws_manager.connection_count().await;
            tracing::info!(count, "Closing socket connections");
            ws_manager.shutdown_all().await;
        };

        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await;

        tracing::info!("Server stopped accepting connections, cleaning up");

        heartbeat.abort();
        if let Some(cleanup) = cleanup {
            cleanup.abort();
        }
        nashstash_db::close(&state.pool).await;

        served.map_err(StartupError::Serve)
    }
}
