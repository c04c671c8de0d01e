//! FHIR Observation retrieval
//!
//! - `FhirClient`: builds search URLs and fetches single pages
//! - `BundlePages`: lazy walk over `next` links under an item budget
//! - `collect_observations`: drains a walk into normalized records
//! - `normalize_observation`: raw Observation to simplified records

mod bundle;
mod client;
mod collect;
mod error;
mod normalize;
mod pages;

pub use bundle::Page;
pub use client::{FhirClient, ObservationSearchResult, DEFAULT_TIMEOUT, FHIR_JSON};
pub use collect::{collect_observations, CollectedObservations, PageProgress};
pub use error::{FetchError, FetchResult};
pub use normalize::normalize_observation;
pub use pages::BundlePages;
