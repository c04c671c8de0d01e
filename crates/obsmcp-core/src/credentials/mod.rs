//! Signed upstream credentials
//!
//! One `CredentialCache` is built at startup for the configured identity and
//! shared by reference with everything that needs an Authorization header.

mod cache;
mod claims;
mod clock;
mod error;
mod signer;

pub use cache::{Credential, CredentialCache, DEFAULT_TTL};
pub use claims::{IdentityClaims, Role};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CredentialError, CredentialResult};
pub use signer::{JwtSigner, SigningAlgorithm, TokenSigner};

#[cfg(test)]
pub(crate) use signer::testing;
