//! Logger that forwards to `tracing`

use super::traits::Logger;

/// A logger that emits `tracing` events
///
/// The component name is attached as a structured field so subscribers can
/// filter on it (e.g. `RUST_LOG=obsmcp_core=debug`).
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: &'static str,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingLogger {
    /// Create a tracing logger for the default component
    pub fn new() -> Self {
        Self { component: "obsmcp" }
    }

    /// Create a tracing logger tagged with a component name
    pub fn for_component(component: &'static str) -> Self {
        Self { component }
    }

    /// Component name attached to every event
    pub fn component(&self) -> &'static str {
        self.component
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(component = self.component, "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(component = self.component, "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(component = self.component, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(component = self.component, "{}", message);
    }
}
