//! In-memory secret store

use std::collections::HashMap;

use super::traits::{SecretInfo, SecretStore};

/// In-memory secret store
///
/// Holds secrets handed over on the command line and the key material
/// generated by tests. Filled through the builder; secrets are lost on drop.
///
/// # Example
///
/// ```
/// use obsmcp_core::secrets::{SecretStore, MemorySecretStore};
///
/// let store = MemorySecretStore::new().with_secret("api_key", "k-test");
/// assert_eq!(store.get("api_key"), Some("k-test".to_string()));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemorySecretStore {
    secrets: HashMap<String, String>,
}

impl MemorySecretStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }

    /// Get the number of secrets in the store
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl SecretStore for MemorySecretStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.secrets.get(key).cloned()
    }

    fn get_info(&self, key: &str) -> SecretInfo {
        if self.has(key) {
            SecretInfo::new(true, self.name())
        } else {
            SecretInfo::not_found()
        }
    }
}
