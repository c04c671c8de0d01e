//! Configuration provider trait

use super::settings::Settings;

/// Source of server settings
///
/// Implementations:
/// - `MemoryConfigProvider`: In-memory for testing
/// - `FileConfigProvider`: YAML file (explicit path, workspace or user level)
pub trait ConfigProvider: Send + Sync {
    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Settings from this source, or `None` when it has nothing to offer
    fn load_settings(&self) -> ConfigResult<Option<Settings>>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid setting {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Missing secret: {0}")]
    MissingSecret(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
