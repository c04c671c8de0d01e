//! Command-line flags
//!
//! Every flag also reads an environment variable and, when given, overrides
//! the settings file.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use obsmcp_core::config::{ConfigProvider, FileConfigProvider, Settings};
use obsmcp_core::credentials::{Role, SigningAlgorithm};
use obsmcp_core::secrets::{keys, MemorySecretStore};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "obsmcp")]
#[command(about = "MCP endpoint for FHIR Observation search", version)]
pub struct Cli {
    /// Settings file; defaults to .config/obsmcp/config.yaml, then ~/.config/obsmcp/config.yaml
    #[arg(short, long, env = "OBSMCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "OBSMCP_BIND")]
    pub bind: Option<String>,

    /// Path of the MCP endpoint
    #[arg(long, env = "OBSMCP_PATH")]
    pub path: Option<String>,

    /// Base URL of the FHIR server
    #[arg(long, env = "OBSMCP_FHIR_BASE_URL")]
    pub fhir_base_url: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long, env = "OBSMCP_FHIR_TIMEOUT")]
    pub fhir_timeout: Option<u64>,

    /// Upstream identity role (admin, staff, veteran)
    #[arg(long, env = "OBSMCP_ROLE")]
    pub role: Option<Role>,

    /// Upstream identity subject
    #[arg(long, env = "OBSMCP_SUBJECT")]
    pub subject: Option<String>,

    /// Signing algorithm (RS256, RS384, ES256)
    #[arg(long, env = "OBSMCP_SIGNING_ALGORITHM")]
    pub algorithm: Option<SigningAlgorithm>,

    /// PEM file with the signing key
    #[arg(long)]
    pub signing_key_file: Option<PathBuf>,

    /// Answer POST requests with JSON instead of an event stream
    #[arg(long, env = "OBSMCP_JSON_RESPONSE")]
    pub json_response: Option<bool>,

    /// Enforce the Host/Origin allow-lists
    #[arg(long, env = "OBSMCP_DNS_REBINDING_PROTECTION")]
    pub dns_rebinding_protection: Option<bool>,

    #[arg(long, env = "OBSMCP_ALLOWED_HOSTS", value_delimiter = ',')]
    pub allowed_hosts: Vec<String>,

    #[arg(long, env = "OBSMCP_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Maximum concurrent sessions
    #[arg(long, env = "OBSMCP_MAX_SESSIONS")]
    pub max_sessions: Option<usize>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, env = "OBSMCP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Settings sources, in priority order
    pub fn config_providers(&self) -> anyhow::Result<Vec<Arc<dyn ConfigProvider>>> {
        if let Some(path) = &self.config {
            return Ok(vec![Arc::new(FileConfigProvider::explicit(path))]);
        }
        let cwd = std::env::current_dir().context("cannot determine working directory")?;
        Ok(vec![
            Arc::new(FileConfigProvider::workspace(cwd)),
            Arc::new(FileConfigProvider::user()),
        ])
    }

    /// Override `settings` with every flag that was given
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(bind) = &self.bind {
            settings.transport.bind = bind.clone();
        }
        if let Some(path) = &self.path {
            settings.transport.path = path.clone();
        }
        if let Some(url) = &self.fhir_base_url {
            settings.fhir.base_url = url.clone();
        }
        if let Some(timeout) = self.fhir_timeout {
            settings.fhir.timeout_secs = timeout;
        }
        if let Some(role) = self.role {
            settings.credentials.role = role;
        }
        if let Some(subject) = &self.subject {
            settings.credentials.subject = subject.clone();
        }
        if let Some(algorithm) = self.algorithm {
            settings.credentials.algorithm = algorithm;
        }
        if let Some(json_response) = self.json_response {
            settings.transport.json_response = json_response;
        }
        if let Some(protection) = self.dns_rebinding_protection {
            settings.transport.dns_rebinding_protection = protection;
        }
        if !self.allowed_hosts.is_empty() {
            settings.transport.allowed_hosts = self.allowed_hosts.clone();
        }
        if !self.allowed_origins.is_empty() {
            settings.transport.allowed_origins = self.allowed_origins.clone();
        }
        if self.max_sessions.is_some() {
            settings.transport.max_sessions = self.max_sessions;
        }
    }

    /// Secrets supplied on the command line
    pub fn secret_store(&self) -> anyhow::Result<MemorySecretStore> {
        let mut store = MemorySecretStore::new();
        if let Some(path) = &self.signing_key_file {
            let pem = fs::read_to_string(path)
                .with_context(|| format!("cannot read signing key {}", path.display()))?;
            store = store.with_secret(keys::SIGNING_KEY, pem);
        }
        Ok(store)
    }
}
