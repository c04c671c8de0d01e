//! Retrieval errors

use thiserror::Error;

use crate::credentials::CredentialError;

/// Errors that abort an Observation retrieval
///
/// Retrieval is all-or-nothing: any of these discards the pages already
/// collected.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The FHIR server answered with a non-success status
    #[error("FHIR server returned HTTP {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    /// Network/HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response was not a JSON bundle
    #[error("Invalid bundle from {url}: {message}")]
    InvalidBundle { url: String, message: String },

    /// The base URL or a pagination link could not be used
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No Authorization header could be produced
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl FetchError {
    /// Create an upstream HTTP error
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::UpstreamHttp {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid bundle error
    pub fn invalid_bundle(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBundle {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Status code of an upstream rejection
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamHttp { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
