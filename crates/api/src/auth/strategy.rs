use std::sync::Arc;

use async_trait::async_trait;
use nashstash_core::settings::Settings;
use serde::Deserialize;

use crate::auth::session::SessionUser;

/// Failure message every strategy currently returns.
pub const NOT_IMPLEMENTED: &str = "Authentication not yet implemented";

pub const LOCAL: &str = "local";
pub const GOOGLE: &str = "google";
pub const APPLE: &str = "apple";

pub const GOOGLE_CALLBACK_PATH: &str = "/api/auth/google/callback";
pub const APPLE_CALLBACK_PATH: &str = "/api/auth/apple/callback";

/// Email and password as posted to the login form. Both are optional so a
/// malformed or empty body still reaches the strategy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// What a strategy is asked to verify.
#[derive(Debug, Clone)]
pub enum AuthRequest {
    Password(Credentials),
    /// Redirect back from a third-party identity provider.
    Callback { code: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(SessionUser),
    Rejected { message: String },
}

impl AuthOutcome {
    fn not_implemented() -> Self {
        Self::Rejected {
            message: NOT_IMPLEMENTED.to_string(),
        }
    }
}

/// A sign-in method.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn authenticate(&self, request: &AuthRequest) -> AuthOutcome;
}

/// Email and password sign-in.
pub struct LocalStrategy;

#[async_trait]
impl Strategy for LocalStrategy {
    fn name(&self) -> &'static str {
        LOCAL
    }

    async fn authenticate(&self, request: &AuthRequest) -> AuthOutcome {
        if let AuthRequest::Password(credentials) = request {
            tracing::debug!(email = ?credentials.email, "Local sign-in attempted");
        }
        AuthOutcome::not_implemented()
    }
}

/// Google OAuth 2.0.
pub struct GoogleStrategy {
    pub client_id: String,
    pub client_secret: String,
    pub callback_path: &'static str,
}

impl GoogleStrategy {
    /// Requires `GOOGLE_CLIENT_ID` and `GOOGLE_CLIENT_SECRET`.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        Some(Self {
            client_id: settings.get("GOOGLE_CLIENT_ID")?.to_string(),
            client_secret: settings.get("GOOGLE_CLIENT_SECRET")?.to_string(),
            callback_path: GOOGLE_CALLBACK_PATH,
        })
    }
}

#[async_trait]
impl Strategy for GoogleStrategy {
    fn name(&self) -> &'static str {
        GOOGLE
    }

    async fn authenticate(&self, _request: &AuthRequest) -> AuthOutcome {
        AuthOutcome::not_implemented()
    }
}

/// Sign in with Apple.
pub struct AppleStrategy {
    pub client_id: String,
    pub team_id: String,
    pub key_id: String,
    pub private_key: String,
    pub callback_path: &'static str,
}

impl AppleStrategy {
    /// Requires `APPLE_CLIENT_ID`, `APPLE_TEAM_ID`, `APPLE_KEY_ID` and `APPLE_KEY`.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        Some(Self {
            client_id: settings.get("APPLE_CLIENT_ID")?.to_string(),
            team_id: settings.get("APPLE_TEAM_ID")?.to_string(),
            key_id: settings.get("APPLE_KEY_ID")?.to_string(),
            private_key: settings.get("APPLE_KEY")?.to_string(),
            callback_path: APPLE_CALLBACK_PATH,
        })
    }
}

#[async_trait]
impl Strategy for AppleStrategy {
    fn name(&self) -> &'static str {
        APPLE
    }

    async fn authenticate(&self, _request: &AuthRequest) -> AuthOutcome {
        AuthOutcome::not_implemented()
    }
}

/// The strategies enabled for this process.
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Register `local` always, and `google` / `apple` when their
    /// credentials are present.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut registry = Self {
            strategies: vec![Arc::new(LocalStrategy)],
        };

        match GoogleStrategy::from_settings(settings) {
            Some(google) => registry.register(Arc::new(google)),
            None => tracing::info!("Google OAuth credentials not configured, strategy disabled"),
        }
        match AppleStrategy::from_settings(settings) {
            Some(apple) => registry.register(Arc::new(apple)),
            None => tracing::info!("Apple Sign In credentials not configured, strategy disabled"),
        }

        tracing::info!(strategies = ?registry.names(), "Authentication strategies registered");
        registry
    }

    /// Add a strategy, replacing any with the same name.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.retain(|s| s.name() != strategy.name());
        self.strategies.push(strategy);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.iter().find(|s| s.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the named strategy. An unregistered name is rejected like any
    /// other failed sign-in.
    pub async fn authenticate(&self, name: &str, request: &AuthRequest) -> AuthOutcome {
        match self.get(name) {
            Some(strategy) => strategy.authenticate(request).await,
            None => {
                tracing::warn!(strategy = name, "Unknown authentication strategy");
                AuthOutcome::not_implemented()
            }
        }
    }
}
