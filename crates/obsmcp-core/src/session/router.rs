//! Demultiplexes one HTTP endpoint into sessions
//!
//! The router is framework agnostic: it takes request headers and body and
//! returns a `TransportResponse` the HTTP layer renders.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use http::header::ACCEPT;
use http::{HeaderMap, StatusCode};
use rmcp::model::ClientJsonRpcMessage;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use super::error::{SessionError, SessionResult};
use super::registry::{Session, SessionRegistry};
use super::security::SecurityGate;
use super::transport::SessionTransport;
use crate::logging::Logger;
use crate::mcp::jsonrpc;
use crate::mcp::{ProtocolEngine, ServerIdentity};
use crate::tools::{Notifier, ToolRegistry};

/// Header carrying the session id in both directions
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

pub const EVENT_STREAM: &str = "text/event-stream";

/// What the HTTP layer should send back
pub enum TransportResponse {
    /// A single JSON body
    Json {
        status: StatusCode,
        body: Value,
        session_id: Option<String>,
    },
    /// A server-sent event stream of JSON-RPC messages
    Events {
        session_id: Option<String>,
        stream: BoxStream<'static, Value>,
    },
    /// 202 with no body
    Accepted,
    /// A bare status
    Empty { status: StatusCode },
}

impl TransportResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json { status, .. } | Self::Empty { status } => *status,
            Self::Events { .. } => StatusCode::OK,
            Self::Accepted => StatusCode::ACCEPTED,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Json { session_id, .. } | Self::Events { session_id, .. } => session_id.as_deref(),
            _ => None,
        }
    }
}

impl From<SessionError> for TransportResponse {
    fn from(error: SessionError) -> Self {
        Self::Json {
            status: error.status(),
            body: error.to_body(),
            session_id: None,
        }
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json { status, body, session_id } => f
                .debug_struct("Json")
                .field("status", status)
                .field("body", body)
                .field("session_id", session_id)
                .finish(),
            Self::Events { session_id, .. } => f
                .debug_struct("Events")
                .field("session_id", session_id)
                .finish_non_exhaustive(),
            Self::Accepted => f.write_str("Accepted"),
            Self::Empty { status } => f.debug_struct("Empty").field("status", status).finish(),
        }
    }
}

/// Routes POST/GET/DELETE on the MCP endpoint to sessions
pub struct TransportRouter {
    registry: Arc<SessionRegistry>,
    tools: Arc<ToolRegistry>,
    identity: Arc<ServerIdentity>,
    gate: SecurityGate,
    json_response: bool,
    logger: Arc<dyn Logger>,
}

impl TransportRouter {
    pub fn new(
        registry: Arc<SessionRegistry>,
        tools: Arc<ToolRegistry>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            registry,
            tools,
            identity: Arc::new(ServerIdentity::default()),
            gate: SecurityGate::open(),
            json_response: false,
            logger,
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: ServerIdentity) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    #[must_use]
    pub fn with_gate(mut self, gate: SecurityGate) -> Self {
        self.gate = gate;
        self
    }

    /// Answer POSTs with plain JSON instead of an event stream
    #[must_use]
    pub fn with_json_response(mut self, json_response: bool) -> Self {
        self.json_response = json_response;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub async fn handle_post(&self, headers: &HeaderMap, body: &[u8]) -> TransportResponse {
        self.post(headers, body)
            .await
            .unwrap_or_else(|e| self.reject("POST", e))
    }

    pub async fn handle_get(&self, headers: &HeaderMap) -> TransportResponse {
        self.get(headers).unwrap_or_else(|e| self.reject("GET", e))
    }

    pub async fn handle_delete(&self, headers: &HeaderMap) -> TransportResponse {
        self.delete(headers).unwrap_or_else(|e| self.reject("DELETE", e))
    }

    async fn post(&self, headers: &HeaderMap, body: &[u8]) -> SessionResult<TransportResponse> {
        self.gate.check(headers)?;
        let message = jsonrpc::parse_message(body)?;

        match session_id(headers) {
            None => self.initialize(message).await,
            Some(id) => {
                let session = self
                    .registry
                    .lookup(id)
                    .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
                Ok(self.dispatch(session, message).await)
            }
        }
    }

    /// Create a session from an `initialize` request
    async fn initialize(&self, message: ClientJsonRpcMessage) -> SessionResult<TransportResponse> {
        if !jsonrpc::is_initialize(&message) {
            return Err(SessionError::NotInitialize);
        }
        let (request, id) = message
            .into_request()
            .ok_or(SessionError::NotInitialize)?;

        if !self.registry.has_capacity() {
            return Err(SessionError::CapacityReached(
                self.registry.max_sessions().unwrap_or_default(),
            ));
        }

        let session_id = Uuid::new_v4().to_string();
        let transport = Arc::new(SessionTransport::new(session_id.clone(), self.json_response));
        let engine = Arc::new(ProtocolEngine::new(
            Arc::clone(&self.tools),
            Arc::clone(&self.identity),
            Arc::clone(&self.logger),
        ));

        let response = engine
            .handle_request(id, request, Notifier::none())
            .await;
        if jsonrpc::is_error(&response) {
            engine.shutdown();
            return Ok(TransportResponse::Json {
                status: StatusCode::BAD_REQUEST,
                body: response,
                session_id: None,
            });
        }

        let session = self.registry.create(Session::new(transport, engine))?;
        Ok(self.single(session.id().to_string(), session.transport().json_response(), response))
    }

    async fn dispatch(&self, session: Arc<Session>, message: ClientJsonRpcMessage) -> TransportResponse {
        match message {
            ClientJsonRpcMessage::Notification(note) => {
                session.engine().handle_notification(note.notification);
                TransportResponse::Accepted
            }
            ClientJsonRpcMessage::Response(response) => {
                self.logger.debug(&format!(
                    "[TransportRouter] Ignoring client response {} on session {}",
                    response.id,
                    session.id()
                ));
                TransportResponse::Accepted
            }
            ClientJsonRpcMessage::Error(error) => {
                self.logger.warn(&format!(
                    "[TransportRouter] Client reported error for {} on session {}: {}",
                    error.id,
                    session.id(),
                    error.error.message
                ));
                TransportResponse::Accepted
            }
            ClientJsonRpcMessage::Request(request) if session.transport().json_response() => {
                // Progress goes to the standalone stream when one is open
                let notifier = Notifier::from(session.transport().stream_sender());
                let body = session
                    .engine()
                    .handle_request(request.id, request.request, notifier)
                    .await;
                TransportResponse::Json {
                    status: StatusCode::OK,
                    body,
                    session_id: Some(session.id().to_string()),
                }
            }
            ClientJsonRpcMessage::Request(request) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let notifier = Notifier::new(tx.clone());
                let engine = Arc::clone(session.engine());
                tokio::spawn(async move {
                    let response = engine
                        .handle_request(request.id, request.request, notifier)
                        .await;
                    let _ = tx.send(response);
                });
                TransportResponse::Events {
                    session_id: Some(session.id().to_string()),
                    stream: UnboundedReceiverStream::new(rx).boxed(),
                }
            }
        }
    }

    fn get(&self, headers: &HeaderMap) -> SessionResult<TransportResponse> {
        self.gate.check(headers)?;
        if !accepts_event_stream(headers) {
            return Err(SessionError::NotAcceptable);
        }

        let id = session_id(headers).ok_or(SessionError::MissingSessionId)?;
        let session = self
            .registry
            .lookup(id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        let rx = session.transport().open_stream()?;

        self.logger.debug(&format!(
            "[TransportRouter] Event stream opened for session {}",
            id
        ));
        Ok(TransportResponse::Events {
            session_id: Some(id.to_string()),
            stream: UnboundedReceiverStream::new(rx).boxed(),
        })
    }

    fn delete(&self, headers: &HeaderMap) -> SessionResult<TransportResponse> {
        self.gate.check(headers)?;
        let id = session_id(headers).ok_or(SessionError::MissingSessionId)?;
        let session = self
            .registry
            .lookup(id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;

        session.transport().close();
        self.registry.remove(id);
        Ok(TransportResponse::Empty {
            status: StatusCode::OK,
        })
    }

    fn single(&self, session_id: String, json_response: bool, response: Value) -> TransportResponse {
        if json_response {
            TransportResponse::Json {
                status: StatusCode::OK,
                body: response,
                session_id: Some(session_id),
            }
        } else {
            TransportResponse::Events {
                session_id: Some(session_id),
                stream: stream::iter([response]).boxed(),
            }
        }
    }

    fn reject(&self, verb: &str, error: SessionError) -> TransportResponse {
        match &error {
            SessionError::Internal(_) => self
                .logger
                .error(&format!("[TransportRouter] {} failed: {}", verb, error)),
            _ => self
                .logger
                .warn(&format!("[TransportRouter] {} rejected: {}", verb, error)),
        }
        error.into()
    }
}

impl std::fmt::Debug for TransportRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRouter")
            .field("registry", &self.registry)
            .field("json_response", &self.json_response)
            .finish_non_exhaustive()
    }
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains(EVENT_STREAM))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::tools::{ToolContext, ToolHandler};
    use async_trait::async_trait;
    use http::HeaderValue;
    use rmcp::model::{CallToolResult, ErrorData, JsonObject, Tool};
    use serde_json::json;

    struct Counter;

    #[async_trait]
    impl ToolHandler for Counter {
        fn definition(&self) -> Tool {
            Tool::new("count", "reports progress twice", Arc::new(JsonObject::new()))
        }

        async fn call(
            &self,
            _arguments: Option<JsonObject>,
            ctx: ToolContext,
        ) -> Result<CallToolResult, ErrorData> {
            ctx.progress(1, "one");
            ctx.progress(2, "two");
            Ok(CallToolResult::structured(json!({"done": true})))
        }
    }

    fn router(json_response: bool) -> TransportRouter {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let tools = ToolRegistry::new(Arc::clone(&logger)).with_tool(Arc::new(Counter));
        TransportRouter::new(
            SessionRegistry::new(Arc::clone(&logger)),
            Arc::new(tools),
            logger,
        )
        .with_json_response(json_response)
    }

    fn headers(session: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/event-stream"));
        if let Some(id) = session {
            headers.insert(SESSION_ID_HEADER, HeaderValue::from_str(id).unwrap());
        }
        headers
    }

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    fn initialize() -> Vec<u8> {
        body(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {"protocolVersion": "2025-06-18", "capabilities": {}, "clientInfo": {"name": "t", "version": "1"}}
        }))
    }

    async fn open_session(router: &TransportRouter) -> String {
        let response = router.handle_post(&headers(None), &initialize()).await;
        assert_eq!(response.status(), StatusCode::OK);
        response.session_id().unwrap().to_string()
    }

    fn json_body(response: TransportResponse) -> (StatusCode, Value) {
        match response {
            TransportResponse::Json { status, body, .. } => (status, body),
            other => panic!("expected JSON, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_json_session_lifecycle() {
        let router = router(true);
        let id = open_session(&router).await;
        assert_eq!(router.session_count(), 1);

        let note = body(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        assert!(matches!(
            router.handle_post(&headers(Some(&id)), &note).await,
            TransportResponse::Accepted
        ));

        let list = body(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}));
        let (status, response) = json_body(router.handle_post(&headers(Some(&id)), &list).await);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["result"]["tools"][0]["name"], "count");

        let deleted = router.handle_delete(&headers(Some(&id))).await;
        assert_eq!(deleted.status(), StatusCode::OK);
        assert_eq!(router.session_count(), 0);

        let (status, response) = json_body(router.handle_post(&headers(Some(&id)), &list).await);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], -32000);
        assert!(response["id"].is_null());

        assert_eq!(router.handle_delete(&headers(Some(&id))).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rejects_without_session() {
        let router = router(true);
        let ping = body(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));

        let (status, response) = json_body(router.handle_post(&headers(None), &ping).await);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], -32000);
        assert_eq!(router.session_count(), 0);

        let (status, _) = json_body(router.handle_post(&headers(None), b"[]").await);
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad_init = body(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}));
        let (status, response) = json_body(router.handle_post(&headers(None), &bad_init).await);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], -32602);
        assert_eq!(router.session_count(), 0);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let router = router(true);
        let a = open_session(&router).await;
        let b = open_session(&router).await;
        assert_ne!(a, b);

        router.handle_delete(&headers(Some(&a))).await;
        let ping = body(json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}));
        let (status, response) = json_body(router.handle_post(&headers(Some(&b)), &ping).await);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["id"], 9);
    }

    #[tokio::test]
    async fn test_event_stream_mode_streams_progress_then_response() {
        let router = router(false);
        let init = router.handle_post(&headers(None), &initialize()).await;
        let id = init.session_id().unwrap().to_string();
        match init {
            TransportResponse::Events { stream, .. } => {
                let messages: Vec<Value> = stream.collect().await;
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0]["result"]["protocolVersion"], "2025-06-18");
            }
            other => panic!("expected events, got {:?}", other),
        }

        let call = body(json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/call",
            "params": {"name": "count", "_meta": {"progressToken": "p"}}
        }));
        let messages: Vec<Value> = match router.handle_post(&headers(Some(&id)), &call).await {
            TransportResponse::Events { stream, .. } => stream.collect().await,
            other => panic!("expected events, got {:?}", other),
        };
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["method"], "notifications/progress");
        assert_eq!(messages[1]["params"]["progress"], 2.0);
        assert_eq!(messages[2]["id"], 2);
        assert_eq!(messages[2]["result"]["structuredContent"]["done"], true);
    }

    #[tokio::test]
    async fn test_standalone_stream_rules() {
        let router = router(true);
        let id = open_session(&router).await;

        let mut plain = headers(Some(&id));
        plain.insert(ACCEPT, HeaderValue::from_static("application/json"));
        assert_eq!(router.handle_get(&plain).await.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(router.handle_get(&headers(None)).await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            router.handle_get(&headers(Some("unknown"))).await.status(),
            StatusCode::BAD_REQUEST
        );

        let first = router.handle_get(&headers(Some(&id))).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(router.handle_get(&headers(Some(&id))).await.status(), StatusCode::CONFLICT);

        // Progress of JSON-mode calls goes to the open stream
        let call = body(json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {"name": "count", "_meta": {"progressToken": 1}}
        }));
        let (_, response) = json_body(router.handle_post(&headers(Some(&id)), &call).await);
        assert_eq!(response["id"], 3);

        router.handle_delete(&headers(Some(&id))).await;
        let streamed: Vec<Value> = match first {
            TransportResponse::Events { stream, .. } => stream.collect().await,
            other => panic!("expected events, got {:?}", other),
        };
        assert_eq!(streamed.len(), 2);
        assert_eq!(streamed[0]["params"]["progressToken"], 1);
    }

    #[tokio::test]
    async fn test_capacity_and_gate() {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let router = TransportRouter::new(
            SessionRegistry::with_limit(Some(1), Arc::clone(&logger)),
            Arc::new(ToolRegistry::new(Arc::clone(&logger))),
            logger,
        )
        .with_json_response(true)
        .with_gate(SecurityGate::open().with_api_key(Some("k".to_string())));

        let (status, _) = json_body(router.handle_post(&headers(None), &initialize()).await);
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut authed = headers(None);
        authed.insert("x-api-key", HeaderValue::from_static("k"));
        assert_eq!(router.handle_post(&authed, &initialize()).await.status(), StatusCode::OK);

        let (status, response) = json_body(router.handle_post(&authed, &initialize()).await);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response["error"]["code"], -32000);
        assert_eq!(router.session_count(), 1);
    }
}
