//! No-op logger implementation

use super::traits::Logger;

/// A logger that does nothing
///
/// Used by tests and by components constructed without a logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl NoOpLogger {
    /// Create a new no-op logger
    pub fn new() -> Self {
        Self
    }
}

impl Logger for NoOpLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_logger_as_shared() {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger::new());
        crate::log_info!(logger, "created session {}", "abc");
        logger.warn("warn message");
    }
}
