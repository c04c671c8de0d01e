//! obsmcp Core
//!
//! MCP tool endpoint for FHIR Observation search, independent of any HTTP
//! framework. The server crate adapts HTTP requests onto
//! `session::TransportRouter`.
//!
//! ## Request path
//!
//! ```rust,ignore
//! use obsmcp_core::{FhirClient, SearchObservationsTool, SessionRegistry, ToolRegistry, TransportRouter};
//!
//! let fhir = FhirClient::new("https://fhir.example.org/r4", credentials, logger.clone())?;
//! let tools = ToolRegistry::new(logger.clone())
//!     .with_tool(Arc::new(SearchObservationsTool::new(fhir, logger.clone())));
//! let router = TransportRouter::new(SessionRegistry::new(logger.clone()), Arc::new(tools), logger);
//!
//! let response = router.handle_post(&headers, &body).await;
//! ```

pub mod config;
pub mod credentials;
pub mod fhir;
pub mod logging;
pub mod mcp;
pub mod secrets;
pub mod session;
pub mod tools;
pub mod types;

// Re-export commonly used types
pub use types::{CancellationToken, SearchArgs, SearchQuery, SimplifiedObservation};

pub use secrets::{ChainSecretStore, EnvSecretStore, MemorySecretStore, SecretStore};

pub use logging::{Logger, NoOpLogger, TracingLogger};

pub use config::{ConfigProvider, FileConfigProvider, Settings};

pub use credentials::{CredentialCache, IdentityClaims, JwtSigner, Role, SigningAlgorithm};

pub use fhir::{FhirClient, FetchError};

pub use mcp::{ProtocolEngine, ServerIdentity};

pub use tools::{SearchObservationsTool, ToolHandler, ToolRegistry};

pub use session::{SecurityGate, SessionRegistry, TransportResponse, TransportRouter};
