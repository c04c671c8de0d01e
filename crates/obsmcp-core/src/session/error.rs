//! Session routing errors

use http::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

use crate::mcp::jsonrpc::JSONRPC_VERSION;
use crate::mcp::MessageError;

/// JSON-RPC code used for transport-level rejections
pub const TRANSPORT_ERROR_CODE: i64 = -32000;

/// JSON-RPC internal error code
pub const INTERNAL_ERROR_CODE: i64 = -32603;

/// Reasons a request is refused before it reaches a protocol engine
///
/// None of these affects other sessions; each maps onto an HTTP status and a
/// JSON-RPC error body with a null id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Bad Request: No valid session ID provided")]
    MissingSessionId,

    #[error("Bad Request: Unknown session ID {0}")]
    UnknownSession(String),

    #[error("Bad Request: Server not initialized; first request must be initialize")]
    NotInitialize,

    #[error("Bad Request: {0}")]
    InvalidMessage(#[from] MessageError),

    #[error("Bad Request: Session already closed")]
    Closed,

    #[error("Conflict: Only one event stream is allowed per session")]
    StreamConflict,

    #[error("Not Acceptable: Client must accept text/event-stream")]
    NotAcceptable,

    #[error("Service Unavailable: Session limit of {0} reached")]
    CapacityReached(usize),

    #[error("Unauthorized: Invalid or missing API key")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingSessionId
            | Self::UnknownSession(_)
            | Self::NotInitialize
            | Self::InvalidMessage(_)
            | Self::Closed => StatusCode::BAD_REQUEST,
            Self::StreamConflict => StatusCode::CONFLICT,
            Self::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            Self::CapacityReached(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Internal(_) => INTERNAL_ERROR_CODE,
            _ => TRANSPORT_ERROR_CODE,
        }
    }

    /// `{"jsonrpc":"2.0","error":{"code":..,"message":..},"id":null}`
    pub fn to_body(&self) -> Value {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "error": {"code": self.code(), "message": self.to_string()},
            "id": null,
        })
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
