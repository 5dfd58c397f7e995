use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use nashstash_core::environment::AppEnvironment;
use nashstash_core::settings::Settings;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8080;

/// Origins the React dev server runs on.
pub const DEV_CLIENT_ORIGINS: [&str; 2] = ["http://localhost:3000", "https://localhost:3000"];

/// Session secret used in development when `SESSION_SECRET` is unset.
pub const DEV_SESSION_SECRET: &str = "dev-secret-change-in-production";

/// Sessions expire after this long without a request.
pub const SESSION_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Length of one rate-limit window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

const PRODUCTION_RATE_LIMIT: u32 = 100;
const DEFAULT_RATE_LIMIT: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{key} must be set in {environment}")]
    Missing {
        key: &'static str,
        environment: AppEnvironment,
    },

    #[error("Invalid CORS origin '{0}'")]
    InvalidOrigin(String),
}

/// Session cookie settings.
#[derive(Clone)]
pub struct SessionConfig {
    /// Secret the cookie signing key is derived from.
    pub secret: String,
    /// Send the cookie over HTTPS only.
    pub secure: bool,
    /// Inactivity expiry.
    pub max_age: Duration,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secure", &self.secure)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

/// Fixed-window limits applied to `/api/*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn for_environment(environment: AppEnvironment) -> Self {
        let max_requests = if environment.is_production() {
            PRODUCTION_RATE_LIMIT
        } else {
            DEFAULT_RATE_LIMIT
        };
        Self {
            max_requests,
            window: RATE_LIMIT_WINDOW,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    pub environment: AppEnvironment,
    /// Browser origins allowed for CORS and WebSocket upgrades.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub session: SessionConfig,
    pub rate_limit: RateLimitConfig,
    /// Built client bundle served in production and QA.
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from settings.
    ///
    /// | Setting                | Default                                         |
    /// |------------------------|-------------------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                                       |
    /// | `PORT`                 | `8080`                                          |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                                            |
    /// | `SESSION_SECRET`       | required when deployed, dev placeholder locally |
    /// | `DEFAULT_CLIENT_URL`   | deployed CORS origin, else `QA_CLIENT_URL`      |
    /// | `STATIC_DIR`           | `build` when deployed                           |
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let environment = settings.environment();

        let host = settings.get_or("HOST", "0.0.0.0");
        let port = parse_setting(settings, "PORT", "port number", DEFAULT_PORT)?;
        let request_timeout_secs =
            parse_setting(settings, "REQUEST_TIMEOUT_SECS", "number of seconds", 30)?;

        let cors_origins = client_origins(settings, environment);
        for origin in &cors_origins {
            if origin.parse::<HeaderValue>().is_err() {
                return Err(ConfigError::InvalidOrigin(origin.clone()));
            }
        }

        let secret = match settings.get("SESSION_SECRET") {
            Some(secret) => secret.to_string(),
            None if environment.is_deployed() => {
                return Err(ConfigError::Missing {
                    key: "SESSION_SECRET",
                    environment,
                })
            }
            None => {
                tracing::warn!("SESSION_SECRET not set, using development placeholder");
                DEV_SESSION_SECRET.to_string()
            }
        };

        let static_dir = environment
            .is_deployed()
            .then(|| PathBuf::from(settings.get_or("STATIC_DIR", "build")));

        Ok(Self {
            host,
            port,
            environment,
            cors_origins,
            request_timeout_secs,
            session: SessionConfig {
                secret,
                secure: environment.is_deployed(),
                max_age: SESSION_MAX_AGE,
            },
            rate_limit: RateLimitConfig::for_environment(environment),
            static_dir,
        })
    }

    /// Whether `origin` is on the browser allow-list.
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        self.cors_origins.iter().any(|allowed| allowed == origin)
    }
}

fn client_origins(settings: &Settings, environment: AppEnvironment) -> Vec<String> {
    if !environment.is_deployed() {
        return DEV_CLIENT_ORIGINS.iter().map(|o| o.to_string()).collect();
    }

    match settings
        .get("DEFAULT_CLIENT_URL")
        .or_else(|| settings.get("QA_CLIENT_URL"))
    {
        Some(url) => vec![url.trim_end_matches('/').to_string()],
        None => {
            tracing::warn!("No client URL configured, cross-origin requests will be refused");
            Vec::new()
        }
    }
}

fn parse_setting<T: std::str::FromStr>(
    settings: &Settings,
    key: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match settings.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            expected,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn development_defaults() {
        let config = ServerConfig::from_settings(&Settings::default()).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:3000", "https://localhost:3000"]
        );
        assert_eq!(config.session.secret, DEV_SESSION_SECRET);
        assert!(!config.session.secure);
        assert_eq!(config.rate_limit.max_requests, 1000);
        assert_eq!(config.rate_limit.window, Duration::from_secs(900));
        assert!(config.static_dir.is_none());
    }

    #[test]
    fn production_settings() {
        let settings = Settings::from_pairs([
            ("NODE_ENV", "production"),
            ("PORT", "9000"),
            ("SESSION_SECRET", "prod-secret"),
            ("DEFAULT_CLIENT_URL", "https://nashstash.app/"),
        ]);
        let config = ServerConfig::from_settings(&settings).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.cors_origins, vec!["https://nashstash.app"]);
        assert!(config.session.secure);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.static_dir, Some(PathBuf::from("build")));
    }

    #[test]
    fn qa_falls_back_to_qa_client_url_and_relaxed_limit() {
        let settings = Settings::from_pairs([
            ("NODE_ENV", "qa"),
            ("SESSION_SECRET", "qa-secret"),
            ("QA_CLIENT_URL", "https://qa.nashstash.app"),
        ]);
        let config = ServerConfig::from_settings(&settings).unwrap();

        assert_eq!(config.cors_origins, vec!["https://qa.nashstash.app"]);
        assert_eq!(config.rate_limit.max_requests, 1000);
        assert!(config.session.secure);
    }

    #[test]
    fn deployed_requires_session_secret() {
        let settings = Settings::from_pairs([("NODE_ENV", "production")]);
        assert_matches!(
            ServerConfig::from_settings(&settings),
            Err(ConfigError::Missing {
                key: "SESSION_SECRET",
                ..
            })
        );
    }

    #[test]
    fn invalid_port_is_rejected() {
        let settings = Settings::from_pairs([("PORT", "eighty")]);
        assert_matches!(
            ServerConfig::from_settings(&settings),
            Err(ConfigError::Invalid { key: "PORT", .. })
        );
    }

    #[test]
    fn invalid_client_url_is_rejected() {
        let settings = Settings::from_pairs([
            ("NODE_ENV", "production"),
            ("SESSION_SECRET", "s"),
            ("DEFAULT_CLIENT_URL", "https://bad\nhost"),
        ]);
        assert_matches!(
            ServerConfig::from_settings(&settings),
            Err(ConfigError::InvalidOrigin(_))
        );
    }

    #[test]
    fn origin_allow_list() {
        let config = ServerConfig::from_settings(&Settings::default()).unwrap();
        assert!(config.is_allowed_origin("http://localhost:3000"));
        assert!(!config.is_allowed_origin("http://evil.example"));
    }

    #[test]
    fn debug_output_hides_session_secret() {
        let settings = Settings::from_pairs([("SESSION_SECRET", "hunter2")]);
        let config = ServerConfig::from_settings(&settings).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
