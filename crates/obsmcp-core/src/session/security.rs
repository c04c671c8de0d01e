//! Request gate applied before session routing

use http::header::{HOST, ORIGIN};
use http::HeaderMap;
use subtle::ConstantTimeEq;

use super::error::{SessionError, SessionResult};

/// Header carrying the static API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// API key and DNS-rebinding checks
#[derive(Debug, Clone, Default)]
pub struct SecurityGate {
    api_key: Option<String>,
    dns_rebinding_protection: bool,
    allowed_hosts: Vec<String>,
    allowed_origins: Vec<String>,
}

impl SecurityGate {
    /// A gate that lets everything through
    pub fn open() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Enforce Host and Origin allow-lists
    ///
    /// An empty list leaves that header unchecked.
    #[must_use]
    pub fn with_dns_rebinding_protection(
        mut self,
        allowed_hosts: Vec<String>,
        allowed_origins: Vec<String>,
    ) -> Self {
        self.dns_rebinding_protection = true;
        self.allowed_hosts = allowed_hosts;
        self.allowed_origins = allowed_origins;
        self
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn check(&self, headers: &HeaderMap) -> SessionResult<()> {
        if let Some(expected) = &self.api_key {
            let presented = headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            if !bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
                return Err(SessionError::Unauthorized);
            }
        }

        if !self.dns_rebinding_protection {
            return Ok(());
        }

        if !self.allowed_hosts.is_empty() {
            let host = headers.get(HOST).and_then(|v| v.to_str().ok());
            match host {
                Some(host) if self.allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) => {}
                Some(host) => return Err(SessionError::Forbidden(format!("Invalid Host header: {}", host))),
                None => return Err(SessionError::Forbidden("Missing Host header".to_string())),
            }
        }

        if !self.allowed_origins.is_empty() {
            // Non-browser clients send no Origin
            if let Some(origin) = headers.get(ORIGIN).and_then(|v| v.to_str().ok()) {
                if !self.allowed_origins.iter().any(|o| o.eq_ignore_ascii_case(origin)) {
                    return Err(SessionError::Forbidden(format!("Invalid Origin header: {}", origin)));
                }
            }
        }

        Ok(())
    }
}
