//! Session-multiplexed streamable HTTP transport
//!
//! - `SessionRegistry`: owns the live session map
//! - `SessionTransport`: per-session stream slot and close hook
//! - `TransportRouter`: POST/GET/DELETE handling on the shared endpoint
//! - `SecurityGate`: API key and DNS-rebinding checks

mod error;
mod registry;
mod router;
mod security;
mod transport;

pub use error::{SessionError, SessionResult, INTERNAL_ERROR_CODE, TRANSPORT_ERROR_CODE};
pub use registry::{Session, SessionRegistry};
pub use router::{TransportResponse, TransportRouter, EVENT_STREAM, SESSION_ID_HEADER};
pub use security::{SecurityGate, API_KEY_HEADER};
pub use transport::SessionTransport;
