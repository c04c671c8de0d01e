//! File-based configuration provider (YAML)
//!
//! Supports user-level (~/.config/obsmcp/config.yaml), workspace-level
//! (.config/obsmcp/config.yaml) and explicitly named files.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::settings::Settings;
use super::traits::{ConfigError, ConfigProvider, ConfigResult};

/// Config level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// A file named on the command line
    Explicit,
    /// Workspace-level config (.config/obsmcp/config.yaml under a root)
    Workspace,
    /// User-level config (~/.config/obsmcp/config.yaml)
    User,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::Explicit => "explicit",
            ConfigLevel::Workspace => "workspace",
            ConfigLevel::User => "user",
        }
    }
}

/// File-based configuration provider
///
/// # Example
///
/// ```no_run
/// use obsmcp_core::config::{ConfigProvider, FileConfigProvider};
///
/// let user = FileConfigProvider::user();
/// let settings = user.load_settings().unwrap().unwrap_or_default();
/// ```
pub struct FileConfigProvider {
    path: PathBuf,
    level: ConfigLevel,
    cache: RwLock<Option<Settings>>,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// A file given explicitly; it must exist when loaded
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ConfigLevel::Explicit)
    }

    /// User-level config provider (~/.config/obsmcp/config.yaml)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
        Self::new(config_dir.join("obsmcp").join("config.yaml"), ConfigLevel::User)
    }

    /// Workspace-level config provider (.config/obsmcp/config.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root
            .as_ref()
            .join(".config")
            .join("obsmcp")
            .join("config.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> ConfigResult<Option<Settings>> {
        if !self.path.exists() {
            if self.level == ConfigLevel::Explicit {
                return Err(ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file not found: {}", self.path.display()),
                )));
            }
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(Some(settings))
    }

    /// Re-read the file, bypassing the cache
    pub fn reload(&self) -> ConfigResult<Option<Settings>> {
        let settings = self.load()?;
        *self.cache.write() = settings.clone();
        Ok(settings)
    }
}

impl ConfigProvider for FileConfigProvider {
    fn name(&self) -> &str {
        self.level.as_str()
    }

    fn load_settings(&self) -> ConfigResult<Option<Settings>> {
        if let Some(settings) = self.cache.read().as_ref() {
            return Ok(Some(settings.clone()));
        }
        self.reload()
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}
