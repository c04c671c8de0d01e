//! obsmcp HTTP server
//!
//! Adapts axum requests onto the framework-agnostic `TransportRouter` and
//! assembles the router from settings and secrets.

pub mod cli;

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};

use obsmcp_core::config::Settings;
use obsmcp_core::credentials::{CredentialCache, JwtSigner};
use obsmcp_core::fhir::FhirClient;
use obsmcp_core::logging::{Logger, TracingLogger};
use obsmcp_core::secrets::{keys, SecretStore};
use obsmcp_core::session::{SessionRegistry, TransportResponse, TransportRouter, SESSION_ID_HEADER};
use obsmcp_core::tools::{SearchObservationsTool, ToolRegistry};

pub use cli::Cli;

/// Shared state of the axum app
#[derive(Clone)]
pub struct AppState {
    router: Arc<TransportRouter>,
}

impl AppState {
    pub fn new(router: Arc<TransportRouter>) -> Self {
        Self { router }
    }
}

/// Install the `tracing` subscriber
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("obsmcp={0},obsmcp_core={0},obsmcp_server={0}", level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn logger(component: &'static str) -> Arc<dyn Logger> {
    Arc::new(TracingLogger::for_component(component))
}

/// Build the transport router for `settings`
///
/// Signs one credential up front so a bad key fails at startup rather than
/// on the first tool call.
pub fn build_router(settings: &Settings, secrets: &dyn SecretStore) -> anyhow::Result<TransportRouter> {
    let pem = secrets.require(keys::SIGNING_KEY).context(
        "signing key not configured (set OBSMCP_SIGNING_KEY or OBSMCP_SIGNING_KEY_FILE)",
    )?;
    let mut signer = JwtSigner::from_pem(settings.credentials.algorithm, pem.as_bytes())?;
    if let Some(kid) = &settings.credentials.key_id {
        signer = signer.with_key_id(kid.clone());
    }

    let credentials = CredentialCache::new(
        settings.credentials.identity(),
        Arc::new(signer),
        logger("credentials"),
    )
    .with_ttl(settings.credentials.ttl());
    credentials
        .get()
        .context("failed to sign the initial upstream credential")?;

    let fhir = FhirClient::with_timeout(
        &settings.fhir.base_url,
        settings.fhir.timeout(),
        Arc::new(credentials),
        logger("fhir"),
    )?;

    let tools = ToolRegistry::new(logger("tools"))
        .with_tool(Arc::new(SearchObservationsTool::new(fhir, logger("tools"))));

    let registry = SessionRegistry::with_limit(settings.transport.max_sessions, logger("session"));
    Ok(TransportRouter::new(registry, Arc::new(tools), logger("session"))
        .with_gate(settings.transport.security_gate(secrets.get(keys::API_KEY)))
        .with_json_response(settings.transport.json_response))
}

/// Routes: the MCP endpoint at `path` plus `GET /health`
pub fn app(router: Arc<TransportRouter>, path: &str) -> Router {
    Router::new()
        .route(path, get(get_mcp).post(post_mcp).delete(delete_mcp))
        .route("/health", get(health))
        .with_state(AppState::new(router))
}

async fn post_mcp(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    render(state.router.handle_post(&headers, &body).await)
}

async fn get_mcp(State(state): State<AppState>, headers: HeaderMap) -> Response {
    render(state.router.handle_get(&headers).await)
}

async fn delete_mcp(State(state): State<AppState>, headers: HeaderMap) -> Response {
    render(state.router.handle_delete(&headers).await)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({"status": "ok", "sessions": state.router.session_count()}))
}

fn render(response: TransportResponse) -> Response {
    match response {
        TransportResponse::Json {
            status,
            body,
            session_id,
        } => with_session((status, Json(body)).into_response(), session_id),
        TransportResponse::Events { session_id, stream } => {
            let events = stream.map(|message| {
                Ok::<_, Infallible>(Event::default().event("message").data(message.to_string()))
            });
            let sse = Sse::new(events).keep_alive(KeepAlive::default());
            with_session(sse.into_response(), session_id)
        }
        TransportResponse::Accepted => StatusCode::ACCEPTED.into_response(),
        TransportResponse::Empty { status } => status.into_response(),
    }
}

fn with_session(mut response: Response, session_id: Option<String>) -> Response {
    if let Some(value) = session_id.and_then(|id| HeaderValue::from_str(&id).ok()) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    response
}
