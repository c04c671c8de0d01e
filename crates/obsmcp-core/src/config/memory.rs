//! In-memory configuration provider

use parking_lot::RwLock;

use super::settings::Settings;
use super::traits::{ConfigProvider, ConfigResult};

/// In-memory configuration provider for testing
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    settings: RwLock<Option<Settings>>,
}

impl MemoryConfigProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(Some(settings)),
        }
    }

    pub fn set_settings(&self, settings: Settings) {
        *self.settings.write() = Some(settings);
    }

    pub fn clear(&self) {
        *self.settings.write() = None;
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn load_settings(&self) -> ConfigResult<Option<Settings>> {
        Ok(self.settings.read().clone())
    }
}
