//! Configuration
//!
//! Settings come from the first source that has them:
//! - `FileConfigProvider`: YAML file (explicit path, workspace or user level)
//! - `MemoryConfigProvider`: In-memory for testing
//!
//! Secrets never live here; see `secrets`.

mod file;
mod memory;
mod settings;
mod traits;

pub use file::{ConfigLevel, FileConfigProvider};
pub use memory::MemoryConfigProvider;
pub use settings::{CredentialSettings, FhirSettings, Settings, TransportSettings};
pub use traits::{ConfigError, ConfigProvider, ConfigResult};
