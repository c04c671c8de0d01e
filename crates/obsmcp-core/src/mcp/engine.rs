//! Per-session MCP protocol engine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use rmcp::model::{
    CallToolRequest, CallToolResult, ClientNotification, ClientRequest, EmptyResult, ErrorCode, ErrorData,
    Implementation, InitializeRequestParams, InitializeResult, ListToolsResult, Meta,
    ProtocolVersion, RequestId, ServerCapabilities, ServerResult,
};
use serde_json::Value;

use super::jsonrpc;
use crate::logging::Logger;
use crate::tools::{Notifier, ToolContext, ToolRegistry};
use crate::types::CancellationToken;

/// Protocol revisions this server speaks, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: [ProtocolVersion; 3] = [
    ProtocolVersion::V_2025_06_18,
    ProtocolVersion::V_2025_03_26,
    ProtocolVersion::V_2024_11_05,
];

pub const LATEST_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::V_2025_06_18;

/// Methods served here whose params failed to decode arrive as custom requests
const TYPED_METHODS: &[&str] = &["initialize", "tools/list", "tools/call"];

const DEFAULT_INSTRUCTIONS: &str = "Use search_observations to list a patient's FHIR \
Observations for a code. Narrow results with since/until and bound them with maxItems.";

/// Static description of this server, shared by every engine
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub title: Option<String>,
    pub version: String,
    pub instructions: Option<String>,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: "obsmcp".to_string(),
            title: Some("FHIR Observation search".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: Some(DEFAULT_INSTRUCTIONS.to_string()),
        }
    }
}

impl ServerIdentity {
    fn implementation(&self) -> Implementation {
        Implementation {
            name: self.name.clone(),
            title: self.title.clone(),
            version: self.version.clone(),
            website_url: None,
            icons: None,
        }
    }
}

/// Dispatches the JSON-RPC traffic of one session
///
/// Created per session and dropped with it. `shutdown` cancels the tool
/// calls still running on behalf of the session.
pub struct ProtocolEngine {
    tools: Arc<ToolRegistry>,
    identity: Arc<ServerIdentity>,
    protocol_version: OnceCell<ProtocolVersion>,
    client_ready: AtomicBool,
    cancel: CancellationToken,
    logger: Arc<dyn Logger>,
}

impl ProtocolEngine {
    pub fn new(
        tools: Arc<ToolRegistry>,
        identity: Arc<ServerIdentity>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            tools,
            identity,
            protocol_version: OnceCell::new(),
            client_ready: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            logger,
        }
    }

    /// Negotiated protocol version, once initialized
    pub fn protocol_version(&self) -> Option<&ProtocolVersion> {
        self.protocol_version.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.protocol_version.get().is_some()
    }

    /// Whether `notifications/initialized` has arrived
    pub fn is_client_ready(&self) -> bool {
        self.client_ready.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel in-flight calls; later requests are refused
    pub fn shutdown(&self) {
        if self.cancel.cancel() {
            self.logger.debug("[ProtocolEngine] Shut down");
        }
    }

    /// Answer one request with a complete JSON-RPC response
    pub async fn handle_request(
        &self,
        id: RequestId,
        request: ClientRequest,
        notifier: Notifier,
    ) -> Value {
        match self.dispatch(request, notifier).await {
            Ok(result) => jsonrpc::success(id, result),
            Err(error) => jsonrpc::failure(id, error),
        }
    }

    pub fn handle_notification(&self, notification: ClientNotification) {
        match notification {
            ClientNotification::InitializedNotification(_) => {
                self.client_ready.store(true, Ordering::SeqCst);
                self.logger.debug("[ProtocolEngine] Client ready");
            }
            ClientNotification::CancelledNotification(cancelled) => {
                self.logger.info(&format!(
                    "[ProtocolEngine] Client cancelled request {}",
                    cancelled.params.request_id
                ));
            }
            ClientNotification::CustomNotification(custom) => {
                self.logger.debug(&format!(
                    "[ProtocolEngine] Ignoring notification: {}",
                    custom.method
                ));
            }
            _ => {
                self.logger.debug("[ProtocolEngine] Ignoring client notification");
            }
        }
    }

    async fn dispatch(
        &self,
        request: ClientRequest,
        notifier: Notifier,
    ) -> Result<ServerResult, ErrorData> {
        if self.is_shut_down() {
            return Err(session_closed());
        }

        match request {
            ClientRequest::InitializeRequest(init) => self.initialize(init.params).map(Into::into),
            ClientRequest::CustomRequest(custom) if custom.method == "initialize" => {
                Err(invalid_params_for(&custom.method))
            }
            ClientRequest::PingRequest(_) => Ok(EmptyResult {}.into()),
            request if !self.is_initialized() => Err(ErrorData::invalid_request(
                format!("Session not initialized; cannot handle {}", request.method()),
                None,
            )),
            ClientRequest::ListToolsRequest(_) => {
                Ok(ListToolsResult::with_all_items(self.tools.definitions()).into())
            }
            ClientRequest::CallToolRequest(call) => self.call_tool(call, notifier).await.map(Into::into),
            ClientRequest::CustomRequest(custom) if TYPED_METHODS.contains(&custom.method.as_str()) => {
                Err(invalid_params_for(&custom.method))
            }
            other => Err(ErrorData::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Method not found: {}", other.method()),
                None,
            )),
        }
    }

    fn initialize(&self, params: InitializeRequestParams) -> Result<InitializeResult, ErrorData> {
        let requested = params.protocol_version;
        let version = SUPPORTED_PROTOCOL_VERSIONS
            .iter()
            .find(|v| **v == requested)
            .cloned()
            .unwrap_or(LATEST_PROTOCOL_VERSION);

        if self.protocol_version.set(version.clone()).is_err() {
            return Err(ErrorData::invalid_request("Session already initialized", None));
        }

        self.logger.info(&format!(
            "[ProtocolEngine] Initialized {} {} with protocol {} (asked for {})",
            params.client_info.name, params.client_info.version, version, requested
        ));

        Ok(InitializeResult {
            protocol_version: version,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: self.identity.implementation(),
            instructions: self.identity.instructions.clone(),
        })
    }

    async fn call_tool(
        &self,
        call: CallToolRequest,
        notifier: Notifier,
    ) -> Result<CallToolResult, ErrorData> {
        let progress_token = call
            .params
            .meta
            .as_ref()
            .or_else(|| call.extensions.get::<Meta>())
            .and_then(Meta::get_progress_token);
        let params = call.params;

        let handler = self.tools.get(&params.name).ok_or_else(|| {
            ErrorData::invalid_params(format!("Unknown tool: {}", params.name), None)
        })?;

        let ctx = ToolContext {
            notifier,
            progress_token,
            cancel: self.cancel.clone(),
        };

        tokio::select! {
            result = handler.call(params.arguments, ctx) => result,
            _ = self.cancel.cancelled() => {
                self.logger.warn(&format!(
                    "[ProtocolEngine] Tool {} cancelled by session close",
                    params.name
                ));
                Err(session_closed())
            }
        }
    }
}

fn session_closed() -> ErrorData {
    ErrorData::internal_error("session closed", None)
}

fn invalid_params_for(method: &str) -> ErrorData {
    ErrorData::invalid_params(format!("Invalid {} params", method), None)
}

impl std::fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("protocol_version", &self.protocol_version.get())
            .field("client_ready", &self.is_client_ready())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::tools::ToolHandler;
    use async_trait::async_trait;
    use rmcp::model::{Content, JsonObject, NumberOrString, Tool};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Slow;

    #[async_trait]
    impl ToolHandler for Slow {
        fn definition(&self) -> Tool {
            Tool::new("slow", "never finishes in time", Arc::new(JsonObject::new()))
        }

        async fn call(
            &self,
            _arguments: Option<JsonObject>,
            _ctx: ToolContext,
        ) -> Result<CallToolResult, ErrorData> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CallToolResult::success(vec![Content::text("late")]))
        }
    }

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        fn definition(&self) -> Tool {
            Tool::new("echo", "echoes its arguments", Arc::new(JsonObject::new()))
        }

        async fn call(
            &self,
            arguments: Option<JsonObject>,
            ctx: ToolContext,
        ) -> Result<CallToolResult, ErrorData> {
            ctx.progress(1, "echoing");
            Ok(CallToolResult::structured(Value::Object(arguments.unwrap_or_default())))
        }
    }

    fn engine() -> Arc<ProtocolEngine> {
        let tools = ToolRegistry::new(Arc::new(NoOpLogger))
            .with_tool(Arc::new(Echo))
            .with_tool(Arc::new(Slow));
        Arc::new(ProtocolEngine::new(
            Arc::new(tools),
            Arc::new(ServerIdentity::default()),
            Arc::new(NoOpLogger),
        ))
    }

    fn init_params(version: &str) -> Value {
        json!({
            "protocolVersion": version,
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "0.0.1"}
        })
    }

    async fn request(engine: &ProtocolEngine, method: &str, params: Value) -> Value {
        request_with(engine, method, params, Notifier::none()).await
    }

    async fn request_with(
        engine: &ProtocolEngine,
        method: &str,
        params: Value,
        notifier: Notifier,
    ) -> Value {
        let request: ClientRequest =
            serde_json::from_value(json!({"method": method, "params": params})).unwrap();
        engine
            .handle_request(NumberOrString::Number(1), request, notifier)
            .await
    }

    fn notification(method: &str) -> ClientNotification {
        serde_json::from_value(json!({"method": method})).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_negotiation() {
        let engine = engine();
        let response = request(&engine, "initialize", init_params("2025-03-26")).await;
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], "2025-03-26");
        assert!(response["result"]["capabilities"]["tools"].is_object());
        assert_eq!(response["result"]["serverInfo"]["name"], "obsmcp");
        assert!(response["result"]["instructions"].is_string());

        let again = request(&engine, "initialize", init_params("2025-03-26")).await;
        assert_eq!(again["error"]["code"], -32600);
        assert_eq!(engine.protocol_version(), Some(&ProtocolVersion::V_2025_03_26));

        let other = self::engine();
        let response = request(&other, "initialize", init_params("1999-01-01")).await;
        assert_eq!(response["result"]["protocolVersion"], "2025-06-18");
        assert_eq!(other.protocol_version(), Some(&LATEST_PROTOCOL_VERSION));
    }

    #[tokio::test]
    async fn test_initialize_with_missing_params() {
        let engine = engine();
        let response = request(&engine, "initialize", json!({})).await;
        assert_eq!(response["error"]["code"], -32602);
        assert!(!engine.is_initialized());
    }

    #[tokio::test]
    async fn test_requests_before_initialize() {
        let engine = engine();
        assert_eq!(request(&engine, "ping", json!({})).await["result"], json!({}));
        assert_eq!(request(&engine, "tools/list", json!({})).await["error"]["code"], -32600);

        request(&engine, "initialize", init_params("2025-06-18")).await;
        engine.handle_notification(notification("notifications/initialized"));
        assert!(engine.is_client_ready());

        let list = request(&engine, "tools/list", json!({})).await;
        let tools = list["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "echo");
        assert!(tools[0]["inputSchema"].is_object());

        assert_eq!(request(&engine, "resources/list", json!({})).await["error"]["code"], -32601);
        assert_eq!(request(&engine, "vendor/thing", json!({})).await["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_tool_dispatch() {
        let engine = engine();
        request(&engine, "initialize", init_params("2025-06-18")).await;

        let echoed = request(&engine, "tools/call", json!({"name": "echo", "arguments": {"a": 1}})).await;
        assert_eq!(echoed["result"]["structuredContent"]["a"], 1);

        let unknown = request(&engine, "tools/call", json!({"name": "nope"})).await;
        assert_eq!(unknown["error"]["code"], -32602);

        let malformed = request(&engine, "tools/call", json!({"arguments": {}})).await;
        assert_eq!(malformed["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_progress_token_from_meta() {
        let engine = engine();
        request(&engine, "initialize", init_params("2025-06-18")).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let response = request_with(
            &engine,
            "tools/call",
            json!({"name": "echo", "arguments": {}, "_meta": {"progressToken": "p-9"}}),
            Notifier::new(tx),
        )
        .await;
        assert!(response.get("result").is_some());

        let progress = rx.try_recv().unwrap();
        assert_eq!(progress["method"], "notifications/progress");
        assert_eq!(progress["params"]["progressToken"], "p-9");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_call() {
        let engine = engine();
        request(&engine, "initialize", init_params("2025-06-18")).await;

        let running = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                request(&engine, "tools/call", json!({"name": "slow"})).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.shutdown();

        let response = running.await.unwrap();
        assert_eq!(response["error"]["code"], -32603);
        assert_eq!(response["error"]["message"], "session closed");

        assert_eq!(request(&engine, "ping", json!({})).await["error"]["code"], -32603);
    }
}
