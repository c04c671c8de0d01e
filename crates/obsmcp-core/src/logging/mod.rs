//! Logging abstractions
//!
//! Components take an `Arc<dyn Logger>` so the library stays independent of
//! the subscriber the host process installs.

mod traits;
mod noop;
mod tracing_logger;

pub use traits::{Logger, SharedLogger};
pub use noop::NoOpLogger;
pub use tracing_logger::TracingLogger;
