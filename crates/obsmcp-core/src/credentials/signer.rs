//! Compact JWS signing.
//!
//! The server signs its own upstream credentials with a private asymmetric
//! key. Supported algorithms:
//!
//! - **RS256** / **RS384**: RSA, PKCS#8 or PKCS#1 PEM
//! - **ES256**: ECDSA P-256, PKCS#8 PEM

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{CredentialError, CredentialResult};

/// Supported signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SigningAlgorithm {
    /// RSA with SHA-256.
    #[default]
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-256 and SHA-256.
    ES256,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES256 => Algorithm::ES256,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES256 => "ES256",
        }
    }

    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "ES256" => Ok(Self::ES256),
            other => Err(CredentialError::invalid_key(format!(
                "unsupported signing algorithm: {}",
                other
            ))),
        }
    }
}

/// Produces a compact signed token from a claims object
pub trait TokenSigner: Send + Sync {
    fn sign(&self, claims: &Map<String, Value>) -> CredentialResult<String>;
}

/// `jsonwebtoken`-backed signer holding one private key
pub struct JwtSigner {
    algorithm: SigningAlgorithm,
    key: EncodingKey,
    key_id: Option<String>,
}

impl JwtSigner {
    /// Load a signer from PEM key material
    pub fn from_pem(algorithm: SigningAlgorithm, pem: &[u8]) -> CredentialResult<Self> {
        let key = if algorithm.is_rsa() {
            EncodingKey::from_rsa_pem(pem)?
        } else {
            EncodingKey::from_ec_pem(pem)?
        };
        Ok(Self {
            algorithm,
            key,
            key_id: None,
        })
    }

    /// Sets the `kid` header.
    #[must_use]
    pub fn with_key_id(mut self, kid: impl Into<String>) -> Self {
        self.key_id = Some(kid.into());
        self
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }
}

impl TokenSigner for JwtSigner {
    fn sign(&self, claims: &Map<String, Value>) -> CredentialResult<String> {
        let mut header = Header::new(self.algorithm.to_jwt_algorithm());
        header.kid = self.key_id.clone();
        Ok(encode(&header, claims, &self.key)?)
    }
}

impl fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSigner")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use p256::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use p256::SecretKey;
    use rand::rngs::OsRng;

    /// Fresh ES256 key pair as (private PKCS#8 PEM, public SPKI PEM)
    pub(crate) fn es256_key_pair() -> (String, String) {
        let secret = SecretKey::random(&mut OsRng);
        let private_pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let public_pem = secret.public_key().to_public_key_pem(LineEnding::LF).unwrap();
        (private_pem, public_pem)
    }
}
