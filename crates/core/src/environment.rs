//! Runtime environment selection.

use std::fmt;

/// Environment variable that selects the runtime environment.
pub const ENVIRONMENT_VAR: &str = "NODE_ENV";

/// The deployment environment the server is running in.
///
/// Parsed from `NODE_ENV`: `production` and `qa` are the deployed
/// environments; any other value (or none) is local development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    #[default]
    Development,
    Qa,
    Production,
}

impl AppEnvironment {
    /// Parse an environment name. Unknown names fall back to development.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("production") => Self::Production,
            Some("qa") => Self::Qa,
            _ => Self::Development,
        }
    }

    /// Whether this is a deployed environment (production or QA).
    ///
    /// Deployed environments load secrets from Secret Manager, connect to
    /// Cloud SQL over a unix socket, persist sessions in Postgres, and
    /// serve the built client bundle.
    pub fn is_deployed(self) -> bool {
        matches!(self, Self::Production | Self::Qa)
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    pub fn is_qa(self) -> bool {
        self == Self::Qa
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Qa => "qa",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
