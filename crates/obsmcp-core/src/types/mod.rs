//! Core types shared across components

mod cancellation;
mod observation;
mod query;

pub use cancellation::CancellationToken;
pub use observation::{CodeRef, SimplifiedObservation};
pub use query::{
    normalize_datetime, QueryError, QueryResult, SearchArgs, SearchQuery, DEFAULT_COUNT,
    DEFAULT_MAX_ITEMS, MAX_COUNT, MAX_MAX_ITEMS,
};
