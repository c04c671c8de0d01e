//! Role-specific claim generators

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::error::CredentialError;

/// Logical identity the server acts as upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Veteran,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Veteran => "veteran",
        }
    }

    /// Base claims every token for this role must carry
    fn generate(&self, subject: &str) -> Map<String, Value> {
        let claims = match self {
            Role::Admin => json!({
                "sub": subject,
                "role": "admin",
                "scope": "system/*.read",
                "admin": true,
            }),
            Role::Staff => json!({
                "sub": subject,
                "role": "staff",
                "scope": "user/Observation.read user/Patient.read",
                "staff_id": subject,
            }),
            Role::Veteran => json!({
                "sub": subject,
                "role": "veteran",
                "scope": "patient/Observation.read",
                "patient": subject,
            }),
        };
        match claims {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "veteran" => Ok(Role::Veteran),
            other => Err(CredentialError::invalid_claims(format!("unknown role: {}", other))),
        }
    }
}

/// Claims describing one logical identity, before time stamping
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityClaims {
    subject: String,
    role: Role,
    base: Map<String, Value>,
}

impl IdentityClaims {
    /// Build the base claims for a role
    pub fn for_role(role: Role, subject: impl Into<String>) -> Self {
        let subject = subject.into();
        let base = role.generate(&subject);
        Self {
            subject,
            role,
            base,
        }
    }

    pub fn admin(subject: impl Into<String>) -> Self {
        Self::for_role(Role::Admin, subject)
    }

    pub fn staff(subject: impl Into<String>) -> Self {
        Self::for_role(Role::Staff, subject)
    }

    pub fn veteran(subject: impl Into<String>) -> Self {
        Self::for_role(Role::Veteran, subject)
    }

    /// Sets the `iss` claim.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.base.insert("iss".to_string(), Value::String(issuer.into()));
        self
    }

    /// Sets the `aud` claim.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.base.insert("aud".to_string(), Value::String(audience.into()));
        self
    }

    /// Replace or add individual claims
    #[must_use]
    pub fn with_overrides(mut self, overrides: Map<String, Value>) -> Self {
        for (key, value) in overrides {
            self.base.insert(key, value);
        }
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn base(&self) -> &Map<String, Value> {
        &self.base
    }

    /// Claims for a token issued at `now` and valid for `ttl_secs`
    ///
    /// Time claims are always set here, after overrides.
    pub(crate) fn stamp(&self, now: i64, ttl_secs: i64) -> Map<String, Value> {
        let mut claims = self.base.clone();
        claims.insert("iat".to_string(), json!(now));
        claims.insert("nbf".to_string(), json!(now));
        claims.insert("auth_time".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + ttl_secs));
        claims.insert("jti".to_string(), json!(uuid::Uuid::new_v4().to_string()));
        claims
    }
}
