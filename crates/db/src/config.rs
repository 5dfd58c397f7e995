//! Connection configuration for the PostgreSQL pool.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use nashstash_core::settings::Settings;
use sqlx::postgres::PgConnectOptions;

/// Maximum pool size.
pub const MAX_CONNECTIONS: u32 = 20;

/// Idle connections are closed after this long.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Checking out a connection fails after this long.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

const DEFAULT_USER: &str = "postgres";
const DEFAULT_DATABASE: &str = "nashstash";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

#[derive(Debug, thiserror::Error)]
pub enum DbConfigError {
    #[error("Invalid value for DB_PORT: expected a port number, got {0:?}")]
    InvalidPort(String),
}

/// Where the database server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    Tcp { host: String, port: u16 },
    /// Directory containing the server's unix socket (Cloud SQL).
    Socket(PathBuf),
}

/// Pool configuration.
///
/// | Setting                    | Deployed (production / QA)               | Development   |
/// |----------------------------|------------------------------------------|---------------|
/// | `DATABASE_URL`             | ignored                                  | overrides all |
/// | `DB_USER`                  | `postgres`                               | `postgres`    |
/// | `DB_PASSWORD`              | none                                     | `postgres`    |
/// | `DB_DATABASE`              | `nashstash`                              | `nashstash`   |
/// | `DB_INSTANCE_UNIX_SOCKET`  | else `/cloudsql/$INSTANCE_CONNECTION_NAME` | --          |
/// | `DB_HOST` / `DB_PORT`      | --                                       | `localhost` / `5432` |
#[derive(Clone)]
pub struct DbConfig {
    pub url: Option<String>,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub target: DbTarget,
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, DbConfigError> {
        let user = settings.get_or("DB_USER", DEFAULT_USER);
        let database = settings.get_or("DB_DATABASE", DEFAULT_DATABASE);

        if settings.environment().is_deployed() {
            let socket = settings
                .get("DB_INSTANCE_UNIX_SOCKET")
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    let instance = settings.get("INSTANCE_CONNECTION_NAME").unwrap_or_default();
                    PathBuf::from(format!("/cloudsql/{instance}"))
                });

            return Ok(Self {
                url: None,
                user,
                password: settings.get("DB_PASSWORD").map(str::to_string),
                database,
                target: DbTarget::Socket(socket),
                ..Self::limits()
            });
        }

        let port = match settings.get("DB_PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw
                .parse()
                .map_err(|_| DbConfigError::InvalidPort(raw.to_string()))?,
        };

        Ok(Self {
            url: settings.get("DATABASE_URL").map(str::to_string),
            user,
            password: Some(settings.get_or("DB_PASSWORD", "postgres")),
            database,
            target: DbTarget::Tcp {
                host: settings.get_or("DB_HOST", DEFAULT_HOST),
                port,
            },
            ..Self::limits()
        })
    }

    fn limits() -> Self {
        Self {
            url: None,
            user: DEFAULT_USER.to_string(),
            password: None,
            database: DEFAULT_DATABASE.to_string(),
            target: DbTarget::Tcp {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
            max_connections: MAX_CONNECTIONS,
            idle_timeout: IDLE_TIMEOUT,
            acquire_timeout: ACQUIRE_TIMEOUT,
        }
    }

    /// Translate into sqlx connect options. Only fails on a malformed
    /// `DATABASE_URL`.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url);
        }

        let mut options = PgConnectOptions::new()
            .username(&self.user)
            .database(&self.database);

        if let Some(password) = &self.password {
            options = options.password(password);
        }

        options = match &self.target {
            DbTarget::Tcp { host, port } => options.host(host).port(*port),
            DbTarget::Socket(dir) => options.socket(dir),
        };

        Ok(options)
    }

    /// Human-readable target for logs. Never includes credentials.
    pub fn describe_target(&self) -> String {
        if self.url.is_some() {
            return "DATABASE_URL".to_string();
        }
        match &self.target {
            DbTarget::Tcp { host, port } => format!("{host}:{port}"),
            DbTarget::Socket(dir) => dir.display().to_string(),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("target", &self.describe_target())
            .field("user", &self.user)
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = DbConfig::from_settings(&Settings::default()).unwrap();

        assert_eq!(config.user, "postgres");
        assert_eq!(config.password.as_deref(), Some("postgres"));
        assert_eq!(config.database, "nashstash");
        assert_eq!(
            config.target,
            DbTarget::Tcp {
                host: "localhost".into(),
                port: 5432
            }
        );
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
    }

    #[test]
    fn development_invalid_port_is_rejected() {
        let settings = Settings::from_pairs([("DB_PORT", "not-a-port")]);
        let err = DbConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, DbConfigError::InvalidPort(ref v) if v == "not-a-port"));

        let settings = Settings::from_pairs([("DB_PORT", "70000")]);
        assert!(DbConfig::from_settings(&settings).is_err());
    }

    #[test]
    fn development_explicit_port() {
        let settings = Settings::from_pairs([("DB_HOST", "db"), ("DB_PORT", "6543")]);
        let config = DbConfig::from_settings(&settings).unwrap();
        assert_eq!(
            config.target,
            DbTarget::Tcp {
                host: "db".into(),
                port: 6543
            }
        );
    }

    #[test]
    fn deployed_uses_explicit_socket() {
        let settings = Settings::from_pairs([
            ("NODE_ENV", "production"),
            ("DB_INSTANCE_UNIX_SOCKET", "/cloudsql/proj:us-central1:db"),
            ("DB_PASSWORD", "pw"),
        ]);
        let config = DbConfig::from_settings(&settings).unwrap();

        assert_eq!(
            config.target,
            DbTarget::Socket(PathBuf::from("/cloudsql/proj:us-central1:db"))
        );
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert!(config.url.is_none());
    }

    #[test]
    fn deployed_derives_socket_from_instance_name() {
        let settings = Settings::from_pairs([
            ("NODE_ENV", "qa"),
            ("INSTANCE_CONNECTION_NAME", "proj:region:qa-db"),
        ]);
        let config = DbConfig::from_settings(&settings).unwrap();

        assert_eq!(
            config.target,
            DbTarget::Socket(PathBuf::from("/cloudsql/proj:region:qa-db"))
        );
        assert_eq!(config.password, None);
    }

    #[test]
    fn deployed_ignores_database_url() {
        let settings = Settings::from_pairs([
            ("NODE_ENV", "production"),
            ("DATABASE_URL", "postgres://elsewhere/db"),
        ]);
        assert!(DbConfig::from_settings(&settings).unwrap().url.is_none());
    }

    #[test]
    fn malformed_url_is_an_error() {
        let settings = Settings::from_pairs([("DATABASE_URL", "not a url")]);
        let config = DbConfig::from_settings(&settings).unwrap();
        assert!(config.connect_options().is_err());
    }

    #[test]
    fn debug_output_hides_password() {
        let settings = Settings::from_pairs([("DB_PASSWORD", "s3cret")]);
        let printed = format!("{:?}", DbConfig::from_settings(&settings).unwrap());
        assert!(!printed.contains("s3cret"));
    }
}
