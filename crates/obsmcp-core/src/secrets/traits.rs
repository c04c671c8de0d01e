//! Core traits and types for secret storage

use thiserror::Error;

/// Well-known secret keys used by the server
pub mod keys {
    /// PKCS#8 PEM private key used to sign upstream credentials
    pub const SIGNING_KEY: &str = "signing_key";
    /// Static API key clients must present on the MCP endpoint
    pub const API_KEY: &str = "api_key";
}

/// Information about a secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretInfo {
    /// Whether the secret exists
    pub available: bool,
    /// Which store provided the secret (useful for chain stores)
    pub source: String,
}

impl SecretInfo {
    pub fn new(available: bool, source: impl Into<String>) -> Self {
        Self {
            available,
            source: source.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            available: false,
            source: "none".to_string(),
        }
    }
}

/// Errors that can occur during secret lookups
#[derive(Error, Debug)]
pub enum SecretStoreError {
    #[error("Secret not found: {0}")]
    NotFound(String),
}

pub type SecretStoreResult<T> = Result<T, SecretStoreError>;

/// Read-only source of secrets
///
/// Implementations:
/// - Environment variables (`EnvSecretStore`)
/// - In-memory for tests and CLI-provided values (`MemorySecretStore`)
/// - Chained for fallback behavior (`ChainSecretStore`)
pub trait SecretStore: Send + Sync {
    /// Human-readable name of this store
    fn name(&self) -> &str;

    /// Check if this store is available
    fn is_available(&self) -> bool {
        true
    }

    /// Retrieve a secret by key
    ///
    /// The key can be one of the names in [`keys`] or a direct store key
    /// (e.g. an environment variable name).
    fn get(&self, key: &str) -> Option<String>;

    /// Check if a secret exists
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Get information about a secret
    fn get_info(&self, key: &str) -> SecretInfo {
        SecretInfo::new(self.has(key), self.name())
    }

    /// Retrieve a secret that must be present
    fn require(&self, key: &str) -> SecretStoreResult<String> {
        self.get(key)
            .ok_or_else(|| SecretStoreError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_info() {
        let info = SecretInfo::new(true, "test");
        assert!(info.available);
        assert_eq!(info.source, "test");

        let not_found = SecretInfo::not_found();
        assert!(!not_found.available);
        assert_eq!(not_found.source, "none");
    }
}
