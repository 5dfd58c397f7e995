//! Key/value settings lookup.
//!
//! [`Settings`] is a snapshot of the process environment taken once at
//! startup. Values fetched from Secret Manager are layered on top with
//! [`Settings::overlay`] instead of being written back into the process
//! environment, so every component reads its configuration from one
//! explicitly passed object.

use std::collections::HashMap;

use crate::environment::{AppEnvironment, ENVIRONMENT_VAR};

#[derive(Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    /// Snapshot the current process environment.
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    /// Build settings from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a value. Empty strings are treated as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Look up a value, falling back to `default` when unset.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Whether `key` has a non-empty value.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key`, replacing any value from the process environment.
    pub fn overlay(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// The runtime environment selected by `NODE_ENV`.
    pub fn environment(&self) -> AppEnvironment {
        AppEnvironment::parse(self.get(ENVIRONMENT_VAR))
    }
}

// Values are credentials more often than not; only the keys are printed.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("Settings").field("keys", &keys).finish()
    }
}
