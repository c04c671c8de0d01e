//! Lazily refreshed credential cache

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::claims::{IdentityClaims, Role};
use super::clock::{Clock, SystemClock};
use super::error::CredentialResult;
use super::signer::TokenSigner;
use crate::logging::Logger;

/// Default credential lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// A signed token together with the claims it was signed from
#[derive(Debug, Clone)]
pub struct Credential {
    pub subject: String,
    pub role: Role,
    pub claims: Map<String, Value>,
    /// Unix seconds; the token is usable strictly before this instant
    pub expires_at: i64,
    pub token: String,
}

impl Credential {
    pub fn is_valid_at(&self, now_secs: i64) -> bool {
        now_secs < self.expires_at
    }
}

/// Holds the one credential of this process's upstream identity
///
/// `get` is cheap while the cached token is valid. When it is absent or
/// expired a new one is signed; two callers racing on an expired token may
/// both sign, and both receive a valid token.
pub struct CredentialCache {
    identity: IdentityClaims,
    signer: Arc<dyn TokenSigner>,
    clock: Arc<dyn Clock>,
    ttl_secs: i64,
    current: RwLock<Option<Arc<Credential>>>,
    logger: Arc<dyn Logger>,
}

impl CredentialCache {
    pub fn new(identity: IdentityClaims, signer: Arc<dyn TokenSigner>, logger: Arc<dyn Logger>) -> Self {
        Self {
            identity,
            signer,
            clock: Arc::new(SystemClock::new()),
            ttl_secs: DEFAULT_TTL.as_secs() as i64,
            current: RwLock::new(None),
            logger,
        }
    }

    /// Replace the clock (tests drive expiry with a `ManualClock`)
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs().max(1) as i64;
        self
    }

    pub fn identity(&self) -> &IdentityClaims {
        &self.identity
    }

    /// A currently valid signed token
    pub fn get(&self) -> CredentialResult<String> {
        Ok(self.credential()?.token.clone())
    }

    /// `Bearer <token>` for the Authorization header
    pub fn authorization_header(&self) -> CredentialResult<String> {
        Ok(format!("Bearer {}", self.get()?))
    }

    /// The full cached credential, regenerating it when absent or expired
    pub fn credential(&self) -> CredentialResult<Arc<Credential>> {
        let now = self.clock.now_secs();
        if let Some(current) = self.current.read().as_ref() {
            if current.is_valid_at(now) {
                return Ok(Arc::clone(current));
            }
        }

        let fresh = Arc::new(self.issue(now)?);
        *self.current.write() = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Drop the cached credential; the next `get` signs a new one
    pub fn invalidate(&self) {
        *self.current.write() = None;
    }

    fn issue(&self, now: i64) -> CredentialResult<Credential> {
        let claims = self.identity.stamp(now, self.ttl_secs);
        let token = self.signer.sign(&claims).map_err(|e| {
            self.logger.error(&format!(
                "[CredentialCache] Signing failed for {} ({}): {}",
                self.identity.subject(),
                self.identity.role(),
                e
            ));
            e
        })?;

        self.logger.debug(&format!(
            "[CredentialCache] Issued {} credential for {}, expires at {}",
            self.identity.role(),
            self.identity.subject(),
            now + self.ttl_secs
        ));

        Ok(Credential {
            subject: self.identity.subject().to_string(),
            role: self.identity.role(),
            claims,
            expires_at: now + self.ttl_secs,
            token,
        })
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("subject", &self.identity.subject())
            .field("role", &self.identity.role())
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}
