//! Environment variable secret store

use std::collections::HashMap;
use std::env;
use std::fs;

use once_cell::sync::Lazy;

use super::traits::{keys, SecretInfo, SecretStore};

/// Mapping from well-known secret keys to environment variable names
static ENV_VAR_MAP: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(keys::SIGNING_KEY, vec!["OBSMCP_SIGNING_KEY", "FHIR_SIGNING_KEY"]);
    m.insert(keys::API_KEY, vec!["OBSMCP_API_KEY", "MCP_API_KEY"]);
    m
});

/// Secret store that reads from environment variables
///
/// Read-only. `.env` files loaded by `dotenvy` in the server binary are
/// visible here as ordinary environment variables.
///
/// # Key Mapping
///
/// - `signing_key` → `OBSMCP_SIGNING_KEY` or `FHIR_SIGNING_KEY`
/// - `api_key` → `OBSMCP_API_KEY` or `MCP_API_KEY`
///
/// Every mapped variable may also be given as `<NAME>_FILE`, in which case
/// the secret is the content of that file (PEM keys are usually mounted this
/// way). Variables can also be read directly by their full name.
#[derive(Debug, Default)]
pub struct EnvSecretStore {
    _private: (),
}

impl EnvSecretStore {
    /// Create a new environment variable secret store
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Get the environment variable names for a well-known key
    pub fn get_env_vars_for_key(key: &str) -> Option<&'static [&'static str]> {
        ENV_VAR_MAP.get(key.to_lowercase().as_str()).map(|v| v.as_slice())
    }

    fn read_var(name: &str) -> Option<String> {
        if let Ok(value) = env::var(name) {
            if !value.is_empty() {
                return Some(value);
            }
        }

        let file_var = format!("{}_FILE", name);
        if let Ok(path) = env::var(&file_var) {
            if let Ok(content) = fs::read_to_string(path.trim()) {
                if !content.trim().is_empty() {
                    return Some(content);
                }
            }
        }

        None
    }
}

impl SecretStore for EnvSecretStore {
    fn name(&self) -> &str {
        "env"
    }

    fn get(&self, key: &str) -> Option<String> {
        // Direct variable name first
        if let Some(value) = Self::read_var(key) {
            return Some(value);
        }

        let lower_key = key.to_lowercase();
        if let Some(env_vars) = ENV_VAR_MAP.get(lower_key.as_str()) {
            for env_var in env_vars {
                if let Some(value) = Self::read_var(env_var) {
                    return Some(value);
                }
            }
        }

        None
    }

    fn get_info(&self, key: &str) -> SecretInfo {
        if self.has(key) {
            SecretInfo::new(true, self.name())
        } else {
            SecretInfo::not_found()
        }
    }
}
