use std::sync::Arc;

use nashstash_cloud::firebase::FirebaseAdmin;
use nashstash_db::DbPool;

use crate::auth::StrategyRegistry;
use crate::config::ServerConfig;
use crate::middleware::rate_limit::RateLimiter;
use crate::ws::WsManager;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; every service is behind an `Arc` or already shared.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<ServerConfig>,
    pub ws_manager: Arc<WsManager>,
    pub strategies: Arc<StrategyRegistry>,
    /// `None` when no usable service account is configured.
    pub firebase: Option<Arc<FirebaseAdmin>>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        config: ServerConfig,
        strategies: StrategyRegistry,
        firebase: Option<FirebaseAdmin>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        Self {
            pool,
            config: Arc::new(config),
            ws_manager: Arc::new(WsManager::new()),
            strategies: Arc::new(strategies),
            firebase: firebase.map(Arc::new),
            rate_limiter,
        }
    }
}
