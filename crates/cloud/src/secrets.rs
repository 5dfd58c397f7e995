//! Runtime secrets from Google Secret Manager.
//!
//! In production and QA a fixed list of secrets is fetched one by one and
//! layered onto [`Settings`]. Every secret yields a [`SecretStatus`]; a
//! failure is logged and recorded but never stops the remaining secrets
//! from loading. Whether a missing secret is fatal is up to the component
//! that needs it.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use nashstash_core::environment::AppEnvironment;
use nashstash_core::settings::Settings;
use serde::Deserialize;

/// Secret Manager REST endpoint.
pub const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com/v1";

/// GCE/Cloud Run metadata endpoint issuing the service account's token.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Setting naming the Google Cloud project that owns the secrets.
pub const PROJECT_SETTING: &str = "GOOGLE_CLOUD_PROJECT";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Secret {0} not found")]
    NotFound(String),

    #[error("Secret Manager returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Malformed secret payload: {0}")]
    Payload(String),
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

/// How a secret's value must look to be usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretFormat {
    Text,
    Json,
}

/// A secret to fetch and the settings key it populates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMapping {
    pub secret_name: String,
    pub key: &'static str,
    pub format: SecretFormat,
}

impl SecretMapping {
    fn text(secret_name: impl Into<String>, key: &'static str) -> Self {
        Self {
            secret_name: secret_name.into(),
            key,
            format: SecretFormat::Text,
        }
    }

    fn json(key: &'static str) -> Self {
        Self {
            secret_name: key.to_string(),
            key,
            format: SecretFormat::Json,
        }
    }
}

/// The secrets loaded for `env`. Empty outside production and QA.
///
/// QA keeps its own database, client URL and Cloud SQL instance under
/// `QA_`-prefixed secret names; everything else is shared.
pub fn secret_mappings(env: AppEnvironment) -> Vec<SecretMapping> {
    if !env.is_deployed() {
        return Vec::new();
    }

    let per_env = |key: &'static str| {
        let name = if env.is_qa() {
            format!("QA_{key}")
        } else {
            key.to_string()
        };
        SecretMapping::text(name, key)
    };

    vec![
        SecretMapping::text("SESSION_SECRET", "SESSION_SECRET"),
        SecretMapping::text("DB_PASSWORD", "DB_PASSWORD"),
        SecretMapping::text("DB_USER", "DB_USER"),
        per_env("DB_DATABASE"),
        per_env("DB_INSTANCE_UNIX_SOCKET"),
        per_env("DEFAULT_CLIENT_URL"),
        per_env("INSTANCE_CONNECTION_NAME"),
        SecretMapping::text("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_ID"),
        SecretMapping::text("GOOGLE_CLIENT_SECRET", "GOOGLE_CLIENT_SECRET"),
        SecretMapping::text("GOOGLE_PLACES_API_KEY", "GOOGLE_PLACES_API_KEY"),
        SecretMapping::text("APPLE_CLIENT_ID", "APPLE_CLIENT_ID"),
        SecretMapping::text("APPLE_TEAM_ID", "APPLE_TEAM_ID"),
        SecretMapping::text("APPLE_KEY_ID", "APPLE_KEY_ID"),
        SecretMapping::text("APPLE_KEY", "APPLE_KEY"),
        SecretMapping::json("FIREBASE_SERVICE_ACCOUNT_JSON"),
        SecretMapping::json("GOOGLE_CLOUD_STORAGE_KEY"),
        SecretMapping::text("GOOGLE_CLOUD_STORAGE_BUCKET", "GOOGLE_CLOUD_STORAGE_BUCKET"),
        SecretMapping::text("STRIPE_SECRET_KEY", "STRIPE_SECRET_KEY"),
        SecretMapping::text("STRIPE_PUBLISHABLE_KEY", "STRIPE_PUBLISHABLE_KEY"),
    ]
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretStatus {
    /// Fetched, valid, and applied to the settings.
    Loaded,
    /// Could not be fetched.
    Missing { reason: String },
    /// Fetched but unusable; not applied.
    Invalid { reason: String },
}

#[derive(Debug, Clone)]
pub struct SecretOutcome {
    pub mapping: SecretMapping,
    pub status: SecretStatus,
}

/// Per-secret result of a load.
#[derive(Debug, Clone, Default)]
pub struct SecretReport {
    pub outcomes: Vec<SecretOutcome>,
}

impl SecretReport {
    /// Status of the secret that populates settings key `key`.
    pub fn status(&self, key: &str) -> Option<&SecretStatus> {
        self.outcomes
            .iter()
            .find(|o| o.mapping.key == key)
            .map(|o| &o.status)
    }

    pub fn loaded_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == SecretStatus::Loaded)
            .count()
    }

    /// Settings keys whose secret was missing or invalid.
    pub fn failed_keys(&self) -> Vec<&'static str> {
        self.outcomes
            .iter()
            .filter(|o| o.status != SecretStatus::Loaded)
            .map(|o| o.mapping.key)
            .collect()
    }

    fn all_missing(mappings: Vec<SecretMapping>, reason: &str) -> Self {
        Self {
            outcomes: mappings
                .into_iter()
                .map(|mapping| SecretOutcome {
                    mapping,
                    status: SecretStatus::Missing {
                        reason: reason.to_string(),
                    },
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Something that can resolve a secret name to its latest value.
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn access(&self, secret_name: &str) -> Result<String, SecretError>;
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    data: String,
}

/// Secret Manager REST client authenticated as the runtime service account.
pub struct SecretManagerClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    access_token: String,
}

impl SecretManagerClient {
    /// Fetch an access token from the metadata server and build a client
    /// for `project_id`.
    pub async fn connect(project_id: &str) -> Result<Self, SecretError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let response = client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SecretError::HttpStatus(response.status().as_u16()));
        }
        let token: AccessTokenResponse = response.json().await?;

        Ok(Self {
            client,
            base_url: SECRET_MANAGER_URL.to_string(),
            project_id: project_id.to_string(),
            access_token: token.access_token,
        })
    }

    fn version_url(&self, secret_name: &str) -> String {
        format!(
            "{}/projects/{}/secrets/{}/versions/latest:access",
            self.base_url, self.project_id, secret_name
        )
    }
}

#[async_trait]
impl SecretSource for SecretManagerClient {
    async fn access(&self, secret_name: &str) -> Result<String, SecretError> {
        let response = self
            .client
            .get(self.version_url(secret_name))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound(secret_name.to_string()));
        }
        if !status.is_success() {
            return Err(SecretError::HttpStatus(status.as_u16()));
        }

        let body: AccessSecretVersionResponse = response.json().await?;
        decode_payload(&body.payload.data)
    }
}

/// Secret Manager returns payloads base64-encoded.
fn decode_payload(data: &str) -> Result<String, SecretError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| SecretError::Payload(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Fetch every mapping from `source` in order and overlay the usable
/// values onto `settings`.
pub async fn load_secrets(
    source: &dyn SecretSource,
    mappings: Vec<SecretMapping>,
    settings: &mut Settings,
) -> SecretReport {
    let mut outcomes = Vec::with_capacity(mappings.len());

    for mapping in mappings {
        let status = match source.access(&mapping.secret_name).await {
            Ok(value) => match validate(&mapping, &value) {
                Ok(()) => {
                    settings.overlay(mapping.key, value);
                    SecretStatus::Loaded
                }
                Err(reason) => {
                    tracing::warn!(secret = %mapping.secret_name, %reason, "Secret is invalid");
                    SecretStatus::Invalid { reason }
                }
            },
            Err(e) => {
                tracing::warn!(secret = %mapping.secret_name, error = %e, "Failed to load secret");
                SecretStatus::Missing {
                    reason: e.to_string(),
                }
            }
        };
        outcomes.push(SecretOutcome { mapping, status });
    }

    let report = SecretReport { outcomes };
    tracing::info!(
        loaded = report.loaded_count(),
        total = report.outcomes.len(),
        "Secrets loaded",
    );
    report
}

fn validate(mapping: &SecretMapping, value: &str) -> Result<(), String> {
    match mapping.format {
        SecretFormat::Text => Ok(()),
        SecretFormat::Json => serde_json::from_str::<serde_json::Value>(value)
            .map(|_| ())
            .map_err(|e| format!("{} is not valid JSON: {e}", mapping.key)),
    }
}

/// Load the secrets for the environment selected in `settings`.
///
/// Does nothing in development. In production and QA, failing to reach
/// Secret Manager at all marks every secret as missing.
pub async fn initialize_secrets(settings: &mut Settings) -> SecretReport {
    let env = settings.environment();
    let mappings = secret_mappings(env);
    if mappings.is_empty() {
        tracing::debug!(%env, "Secret Manager not used in this environment");
        return SecretReport::default();
    }

    let Some(project_id) = settings.get(PROJECT_SETTING).map(str::to_string) else {
        tracing::warn!("{PROJECT_SETTING} is not set, skipping Secret Manager");
        return SecretReport::all_missing(mappings, "GOOGLE_CLOUD_PROJECT is not set");
    };

    match SecretManagerClient::connect(&project_id).await {
        Ok(client) => load_secrets(&client, mappings, settings).await,
        Err(e) => {
            tracing::warn!(error = %e, "Could not authenticate to Secret Manager");
            SecretReport::all_missing(mappings, &e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;

    /// In-memory source that records the order of requests.
    #[derive(Default)]
    struct FakeSource {
        values: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn with(pairs: &[(&str, &str)]) -> Self {
            Self {
                values: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SecretSource for FakeSource {
        async fn access(&self, secret_name: &str) -> Result<String, SecretError> {
            self.requested.lock().unwrap().push(secret_name.to_string());
            self.values
                .get(secret_name)
                .cloned()
                .ok_or_else(|| SecretError::NotFound(secret_name.to_string()))
        }
    }

    #[test]
    fn development_loads_nothing() {
        assert!(secret_mappings(AppEnvironment::Development).is_empty());
    }

    #[test]
    fn production_mappings_use_plain_names() {
        let mappings = secret_mappings(AppEnvironment::Production);
        assert_eq!(mappings.len(), 19);
        assert!(mappings.iter().all(|m| !m.secret_name.starts_with("QA_")));
        assert!(mappings.iter().all(|m| m.secret_name == m.key));
    }

    #[test]
    fn qa_mappings_prefix_environment_specific_secrets() {
        let mappings = secret_mappings(AppEnvironment::Qa);
        let name_for = |key: &str| {
            mappings
                .iter()
                .find(|m| m.key == key)
                .map(|m| m.secret_name.clone())
                .unwrap()
        };

        assert_eq!(name_for("DB_DATABASE"), "QA_DB_DATABASE");
        assert_eq!(name_for("DB_INSTANCE_UNIX_SOCKET"), "QA_DB_INSTANCE_UNIX_SOCKET");
        assert_eq!(name_for("DEFAULT_CLIENT_URL"), "QA_DEFAULT_CLIENT_URL");
        assert_eq!(name_for("INSTANCE_CONNECTION_NAME"), "QA_INSTANCE_CONNECTION_NAME");
        assert_eq!(name_for("DB_PASSWORD"), "DB_PASSWORD");
        assert_eq!(name_for("SESSION_SECRET"), "SESSION_SECRET");
    }

    #[test]
    fn only_credential_documents_are_json() {
        let json_keys: Vec<_> = secret_mappings(AppEnvironment::Production)
            .into_iter()
            .filter(|m| m.format == SecretFormat::Json)
            .map(|m| m.key)
            .collect();
        assert_eq!(
            json_keys,
            ["FIREBASE_SERVICE_ACCOUNT_JSON", "GOOGLE_CLOUD_STORAGE_KEY"]
        );
    }

    #[tokio::test]
    async fn loads_in_order_and_overlays_values() {
        let source = FakeSource::with(&[
            ("SESSION_SECRET", "from-secret-manager"),
            ("QA_DB_DATABASE", "nashstash_qa"),
        ]);
        let mut settings = Settings::from_pairs([("SESSION_SECRET", "local")]);

        let mappings = secret_mappings(AppEnvironment::Qa);
        let expected_order: Vec<_> = mappings.iter().map(|m| m.secret_name.clone()).collect();
        let report = load_secrets(&source, mappings, &mut settings).await;

        assert_eq!(*source.requested.lock().unwrap(), expected_order);
        assert_eq!(settings.get("SESSION_SECRET"), Some("from-secret-manager"));
        assert_eq!(settings.get("DB_DATABASE"), Some("nashstash_qa"));
        assert_eq!(report.loaded_count(), 2);
        assert_eq!(report.status("DB_DATABASE"), Some(&SecretStatus::Loaded));
    }

    #[tokio::test]
    async fn missing_secret_does_not_stop_the_rest() {
        let source = FakeSource::with(&[("STRIPE_PUBLISHABLE_KEY", "pk_live")]);
        let mut settings = Settings::default();

        let report = load_secrets(
            &source,
            secret_mappings(AppEnvironment::Production),
            &mut settings,
        )
        .await;

        assert_eq!(report.outcomes.len(), 19);
        assert_eq!(report.loaded_count(), 1);
        assert_matches!(
            report.status("SESSION_SECRET"),
            Some(SecretStatus::Missing { reason }) if reason.contains("not found")
        );
        assert_eq!(settings.get("STRIPE_PUBLISHABLE_KEY"), Some("pk_live"));
        assert!(report.failed_keys().contains(&"DB_PASSWORD"));
    }

    #[tokio::test]
    async fn invalid_json_is_reported_and_not_applied() {
        let source = FakeSource::with(&[
            ("FIREBASE_SERVICE_ACCOUNT_JSON", "{not json"),
            ("GOOGLE_CLOUD_STORAGE_KEY", r#"{"type":"service_account"}"#),
        ]);
        let mut settings = Settings::default();

        let report = load_secrets(
            &source,
            secret_mappings(AppEnvironment::Production),
            &mut settings,
        )
        .await;

        assert_matches!(
            report.status("FIREBASE_SERVICE_ACCOUNT_JSON"),
            Some(SecretStatus::Invalid { .. })
        );
        assert_eq!(settings.get("FIREBASE_SERVICE_ACCOUNT_JSON"), None);
        assert_eq!(
            report.status("GOOGLE_CLOUD_STORAGE_KEY"),
            Some(&SecretStatus::Loaded)
        );
    }

    #[tokio::test]
    async fn development_initialization_is_a_no_op() {
        let mut settings = Settings::from_pairs([("NODE_ENV", "development")]);
        let report = initialize_secrets(&mut settings).await;
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn deployed_without_project_marks_everything_missing() {
        let mut settings = Settings::from_pairs([("NODE_ENV", "production")]);
        let report = initialize_secrets(&mut settings).await;

        assert_eq!(report.outcomes.len(), 19);
        assert_eq!(report.loaded_count(), 0);
        assert_matches!(
            report.status("DB_PASSWORD"),
            Some(SecretStatus::Missing { reason }) if reason.contains("GOOGLE_CLOUD_PROJECT")
        );
    }

    #[test]
    fn payload_is_base64_decoded() {
        assert_eq!(decode_payload("aHVudGVyMg==").unwrap(), "hunter2");
        assert_matches!(decode_payload("%%%"), Err(SecretError::Payload(_)));
    }

    #[test]
    fn version_url_targets_latest() {
        let client = SecretManagerClient {
            client: reqwest::Client::new(),
            base_url: SECRET_MANAGER_URL.to_string(),
            project_id: "nash-stash".to_string(),
            access_token: String::new(),
        };
        assert_eq!(
            client.version_url("DB_PASSWORD"),
            "https://secretmanager.googleapis.com/v1/projects/nash-stash/secrets/DB_PASSWORD/versions/latest:access"
        );
    }
}
