//! Secret storage abstractions and implementations
//!
//! Signing key material and the static API key never live in the settings
//! file; they are resolved through a `SecretStore`:
//! - `EnvSecretStore`: environment variables (and `<NAME>_FILE` indirection)
//! - `MemorySecretStore`: values supplied on the command line or by tests
//! - `ChainSecretStore`: ordered fallback over several stores

mod traits;
mod env_store;
mod memory_store;
mod chain_store;

pub use traits::{keys, SecretStore, SecretInfo, SecretStoreError, SecretStoreResult};
pub use env_store::EnvSecretStore;
pub use memory_store::MemorySecretStore;
pub use chain_store::ChainSecretStore;
