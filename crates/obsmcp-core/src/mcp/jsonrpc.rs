//! JSON-RPC 2.0 framing for MCP messages
//!
//! Inbound bodies are decoded into rmcp's `ClientJsonRpcMessage`; outbound
//! responses and notifications are built from `ServerJsonRpcMessage` and
//! handed to the transport as JSON values.

use rmcp::model::{
    ClientJsonRpcMessage, ClientRequest, ErrorData, RequestId, ServerJsonRpcMessage,
    ServerNotification, ServerResult,
};
use serde_json::{json, Value};
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

/// Why an inbound body could not be framed as a single JSON-RPC message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Batch requests are not supported")]
    Batch,

    #[error("Invalid JSON-RPC message: {0}")]
    Invalid(String),
}

/// Frame a POST body
pub fn parse_message(body: &[u8]) -> Result<ClientJsonRpcMessage, MessageError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| MessageError::Parse(e.to_string()))?;

    match &value {
        Value::Object(object) => {
            // rmcp would read a malformed id as a notification
            if let Some(id) = object.get("id") {
                if !(id.is_string() || id.is_number()) {
                    return Err(MessageError::Invalid("id must be a string or number".to_string()));
                }
            }
        }
        Value::Array(_) => return Err(MessageError::Batch),
        _ => return Err(MessageError::Invalid("expected an object".to_string())),
    }

    serde_json::from_value(value).map_err(|e| MessageError::Invalid(e.to_string()))
}

/// Whether the message asks to open a session
///
/// An `initialize` whose params do not decode still counts; the engine
/// answers it with invalid params.
pub fn is_initialize(message: &ClientJsonRpcMessage) -> bool {
    match message {
        ClientJsonRpcMessage::Request(request) => {
            matches!(request.request, ClientRequest::InitializeRequest(_))
                || request.request.method() == "initialize"
        }
        _ => false,
    }
}

pub fn success(id: RequestId, result: impl Into<ServerResult>) -> Value {
    encode(ServerJsonRpcMessage::response(result.into(), id))
}

pub fn failure(id: RequestId, error: ErrorData) -> Value {
    encode(ServerJsonRpcMessage::error(error, id))
}

pub fn notification(notification: impl Into<ServerNotification>) -> Value {
    encode(ServerJsonRpcMessage::notification(notification.into()))
}

/// Whether a framed response carries an error
pub fn is_error(response: &Value) -> bool {
    response.get("error").is_some()
}

fn encode(message: ServerJsonRpcMessage) -> Value {
    serde_json::to_value(message).unwrap_or_else(|e| {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": Value::Null,
            "error": ErrorData::internal_error(e.to_string(), None),
        })
    })
}
