//! Credential errors

/// Errors raised while building or signing upstream credentials.
///
/// A signing failure is fatal to the request that needed the token; the
/// cache never hands out an unsigned or expired token in its place.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The private key material could not be loaded.
    #[error("Invalid signing key: {message}")]
    InvalidKey {
        /// Description of why the key was rejected.
        message: String,
    },

    /// The signer failed to produce a token.
    #[error("Failed to sign credential: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// The claims could not be assembled.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why the claims are invalid.
        message: String,
    },
}

impl CredentialError {
    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for CredentialError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                Self::invalid_key(err.to_string())
            }
            _ => Self::signing(err.to_string()),
        }
    }
}

pub type CredentialResult<T> = Result<T, CredentialError>;
