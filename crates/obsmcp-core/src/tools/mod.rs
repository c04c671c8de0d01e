//! Tools exposed over MCP
//!
//! - `ToolHandler`: one callable tool
//! - `ToolRegistry`: the set a protocol engine serves
//! - `SearchObservationsTool`: FHIR Observation search

mod handler;
mod observations;
mod registry;

pub use handler::{Notifier, ToolContext, ToolHandler};
pub use observations::{SearchObservationsTool, SEARCH_OBSERVATIONS};
pub use registry::ToolRegistry;
