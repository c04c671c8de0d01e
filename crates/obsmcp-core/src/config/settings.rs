//! Server settings

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use super::traits::{ConfigError, ConfigProvider, ConfigResult};
use crate::credentials::{IdentityClaims, Role, SigningAlgorithm, DEFAULT_TTL};
use crate::fhir::DEFAULT_TIMEOUT;
use crate::session::SecurityGate;

/// Complete server settings
///
/// Every section and field has a default, so a settings file only needs the
/// values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fhir: FhirSettings,
    pub credentials: CredentialSettings,
    pub transport: TransportSettings,
}

/// Upstream FHIR server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FhirSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for FhirSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/fhir".to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl FhirSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Identity used for upstream credentials
///
/// The signing key itself comes from the secret store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub role: Role,
    pub subject: String,
    pub algorithm: SigningAlgorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    pub ttl_secs: u64,
    /// Claims merged over the role's base claims
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub overrides: Map<String, Value>,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            role: Role::Admin,
            subject: "obsmcp".to_string(),
            algorithm: SigningAlgorithm::default(),
            key_id: None,
            issuer: None,
            audience: None,
            ttl_secs: DEFAULT_TTL.as_secs(),
            overrides: Map::new(),
        }
    }
}

impl CredentialSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Base claims for the configured identity
    pub fn identity(&self) -> IdentityClaims {
        let mut identity = IdentityClaims::for_role(self.role, self.subject.clone());
        if let Some(issuer) = &self.issuer {
            identity = identity.with_issuer(issuer.clone());
        }
        if let Some(audience) = &self.audience {
            identity = identity.with_audience(audience.clone());
        }
        if !self.overrides.is_empty() {
            identity = identity.with_overrides(self.overrides.clone());
        }
        identity
    }
}

/// The MCP endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub bind: String,
    pub path: String,
    /// Answer POSTs with JSON instead of an event stream
    pub json_response: bool,
    pub dns_rebinding_protection: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_hosts: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_origins: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            path: "/mcp".to_string(),
            json_response: false,
            dns_rebinding_protection: false,
            allowed_hosts: Vec::new(),
            allowed_origins: Vec::new(),
            max_sessions: None,
        }
    }
}

impl TransportSettings {
    pub fn bind_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| ConfigError::invalid("transport.bind", format!("{}: {}", self.bind, e)))
    }

    /// Gate for the endpoint, given the API key from the secret store
    pub fn security_gate(&self, api_key: Option<String>) -> SecurityGate {
        let gate = SecurityGate::open().with_api_key(api_key);
        if self.dns_rebinding_protection {
            gate.with_dns_rebinding_protection(
                self.allowed_hosts.clone(),
                self.allowed_origins.clone(),
            )
        } else {
            gate
        }
    }
}

impl Settings {
    /// Check values serde cannot
    pub fn validate(&self) -> ConfigResult<()> {
        let base = Url::parse(&self.fhir.base_url)
            .map_err(|e| ConfigError::invalid("fhir.base_url", format!("{}: {}", self.fhir.base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::invalid("fhir.base_url", "must be an http(s) URL"));
        }
        if self.fhir.timeout_secs == 0 {
            return Err(ConfigError::invalid("fhir.timeout_secs", "must be positive"));
        }
        if self.credentials.subject.trim().is_empty() {
            return Err(ConfigError::invalid("credentials.subject", "must not be empty"));
        }
        if self.credentials.ttl_secs == 0 {
            return Err(ConfigError::invalid("credentials.ttl_secs", "must be positive"));
        }
        if !self.transport.path.starts_with('/') {
            return Err(ConfigError::invalid("transport.path", "must start with '/'"));
        }
        if self.transport.max_sessions == Some(0) {
            return Err(ConfigError::invalid("transport.max_sessions", "must be at least 1"));
        }
        self.transport.bind_addr()?;
        Ok(())
    }

    /// First settings offered by `providers`, in order, else defaults
    pub fn resolve(providers: &[Arc<dyn ConfigProvider>]) -> ConfigResult<(Self, String)> {
        for provider in providers {
            if let Some(settings) = provider.load_settings()? {
                return Ok((settings, provider.name().to_string()));
            }
        }
        Ok((Self::default(), "defaults".to_string()))
    }
}
