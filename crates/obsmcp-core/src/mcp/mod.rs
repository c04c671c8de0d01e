//! MCP server-side protocol handling
//!
//! - `jsonrpc`: message framing
//! - `ProtocolEngine`: per-session dispatcher for `initialize`, `ping`,
//!   `tools/list`, `tools/call` and notifications

mod engine;
pub mod jsonrpc;

pub use engine::{ProtocolEngine, ServerIdentity, LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};
pub use jsonrpc::MessageError;
