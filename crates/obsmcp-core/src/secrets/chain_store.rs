//! Chained secret store with fallback behavior

use std::sync::Arc;

use super::traits::{SecretInfo, SecretStore};

/// A secret store that tries several stores in order
///
/// The server chains the command-line store in front of the environment so
/// explicit flags win over inherited variables.
///
/// # Example
///
/// ```
/// use obsmcp_core::secrets::{SecretStore, ChainSecretStore, EnvSecretStore, MemorySecretStore};
/// use std::sync::Arc;
///
/// let cli: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new().with_secret("api_key", "from-cli"));
/// let chain = ChainSecretStore::new(vec![cli, Arc::new(EnvSecretStore::new())]);
/// assert_eq!(chain.get("api_key"), Some("from-cli".to_string()));
/// ```
pub struct ChainSecretStore {
    stores: Vec<Arc<dyn SecretStore>>,
}

impl ChainSecretStore {
    /// Create a new chain store; stores are tried in order for reads
    pub fn new(stores: Vec<Arc<dyn SecretStore>>) -> Self {
        Self { stores }
    }

    /// Find which store has a key
    pub fn find_store(&self, key: &str) -> Option<&Arc<dyn SecretStore>> {
        self.stores
            .iter()
            .find(|store| store.is_available() && store.has(key))
    }
}

impl SecretStore for ChainSecretStore {
    fn name(&self) -> &str {
        "chain"
    }

    fn is_available(&self) -> bool {
        self.stores.iter().any(|s| s.is_available())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.stores
            .iter()
            .filter(|store| store.is_available())
            .find_map(|store| store.get(key))
    }

    fn get_info(&self, key: &str) -> SecretInfo {
        match self.find_store(key) {
            Some(store) => SecretInfo::new(true, store.name()),
            None => SecretInfo::not_found(),
        }
    }
}
