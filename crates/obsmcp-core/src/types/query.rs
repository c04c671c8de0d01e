//! Observation search query and its validation

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_COUNT: u32 = 100;
pub const MAX_COUNT: u32 = 1000;
pub const DEFAULT_MAX_ITEMS: u32 = 200;
pub const MAX_MAX_ITEMS: u32 = 5000;

/// Errors raised while validating a query, before any network call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: u32,
        max: u32,
    },

    #[error("{field} is not an ISO-8601 datetime: {value}")]
    InvalidDate { field: &'static str, value: String },
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Raw arguments of the `search_observations` tool
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
#[serde(rename_all = "camelCase")]
pub struct SearchArgs {
    /// FHIR Patient id whose Observations are searched
    pub patient_id: String,
    /// Observation code (matched through the combo-code search parameter)
    pub code: String,
    /// Only Observations on or after this ISO-8601 datetime
    #[serde(default)]
    pub since: Option<String>,
    /// Only Observations on or before this ISO-8601 datetime
    #[serde(default)]
    pub until: Option<String>,
    /// Page size requested from the FHIR server (1-1000, default 100)
    #[serde(default)]
    #[schemars(range(min = 1, max = 1000))]
    pub count: Option<i64>,
    /// Maximum number of simplified items returned (1-5000, default 200)
    #[serde(default)]
    #[schemars(range(min = 1, max = 5000))]
    pub max_items: Option<i64>,
}

/// A validated, immutable Observation search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    patient_id: String,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    until: Option<String>,
    count: u32,
    max_items: u32,
}

impl SearchQuery {
    /// Build a query with defaults for everything optional
    pub fn new(patient_id: impl Into<String>, code: impl Into<String>) -> QueryResult<Self> {
        Self::from_args(SearchArgs {
            patient_id: patient_id.into(),
            code: code.into(),
            ..Default::default()
        })
    }

    /// Validate tool arguments into a query
    pub fn from_args(args: SearchArgs) -> QueryResult<Self> {
        let patient_id = args.patient_id.trim().to_string();
        if patient_id.is_empty() {
            return Err(QueryError::MissingField("patientId"));
        }
        let code = args.code.trim().to_string();
        if code.is_empty() {
            return Err(QueryError::MissingField("code"));
        }

        let since = args
            .since
            .as_deref()
            .map(|v| normalize_datetime("since", v))
            .transpose()?;
        let until = args
            .until
            .as_deref()
            .map(|v| normalize_datetime("until", v))
            .transpose()?;

        Ok(Self {
            patient_id,
            code,
            since,
            until,
            count: bounded("count", args.count, DEFAULT_COUNT, MAX_COUNT)?,
            max_items: bounded("maxItems", args.max_items, DEFAULT_MAX_ITEMS, MAX_MAX_ITEMS)?,
        })
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn since(&self) -> Option<&str> {
        self.since.as_deref()
    }

    pub fn until(&self) -> Option<&str> {
        self.until.as_deref()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_items(&self) -> u32 {
        self.max_items
    }
}

fn bounded(field: &'static str, value: Option<i64>, default: u32, max: u32) -> QueryResult<u32> {
    match value {
        None => Ok(default),
        Some(v) if v >= 1 && v <= i64::from(max) => Ok(v as u32),
        Some(v) => Err(QueryError::OutOfRange {
            field,
            value: v,
            min: 1,
            max,
        }),
    }
}

/// Normalize an ISO-8601 input to `YYYY-MM-DDTHH:MM:SS.sssZ`
///
/// Accepts RFC 3339 with any offset, a datetime without offset (taken as
/// UTC), or a bare date (midnight UTC).
pub fn normalize_datetime(field: &'static str, input: &str) -> QueryResult<String> {
    let trimmed = input.trim();
    let parsed = DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .or_else(|_| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M").map(|dt| dt.and_utc())
        })
        .or_else(|_| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
        })
        .map_err(|_| QueryError::InvalidDate {
            field,
            value: input.to_string(),
        })?;

    Ok(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(patient: &str, code: &str) -> SearchArgs {
        SearchArgs {
            patient_id: patient.to_string(),
            code: code.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let query = SearchQuery::new("123", "8310-5").unwrap();
        assert_eq!(query.count(), 100);
        assert_eq!(query.max_items(), 200);
        assert_eq!(query.since(), None);
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(
            SearchQuery::from_args(args("  ", "8310-5")),
            Err(QueryError::MissingField("patientId"))
        );
        assert_eq!(
            SearchQuery::from_args(args("123", "")),
            Err(QueryError::MissingField("code"))
        );
    }

    #[test]
    fn test_bounds() {
        let mut a = args("123", "8310-5");
        a.count = Some(0);
        assert!(matches!(
            SearchQuery::from_args(a.clone()),
            Err(QueryError::OutOfRange { field: "count", .. })
        ));

        a.count = Some(1000);
        a.max_items = Some(5001);
        assert!(matches!(
            SearchQuery::from_args(a.clone()),
            Err(QueryError::OutOfRange { field: "maxItems", .. })
        ));

        a.max_items = Some(5000);
        let query = SearchQuery::from_args(a).unwrap();
        assert_eq!(query.count(), 1000);
        assert_eq!(query.max_items(), 5000);
    }

    #[test]
    fn test_datetime_normalization() {
        assert_eq!(
            normalize_datetime("since", "2024-03-01T10:15:00+02:00").unwrap(),
            "2024-03-01T08:15:00.000Z"
        );
        assert_eq!(
            normalize_datetime("since", "2024-03-01").unwrap(),
            "2024-03-01T00:00:00.000Z"
        );
        assert_eq!(
            normalize_datetime("until", "2024-03-01T23:59:59.5").unwrap(),
            "2024-03-01T23:59:59.500Z"
        );
        assert!(matches!(
            normalize_datetime("until", "yesterday"),
            Err(QueryError::InvalidDate { field: "until", .. })
        ));
    }

    #[test]
    fn test_query_echo_serialization() {
        let mut a = args("123", "8310-5");
        a.since = Some("2024-01-01".to_string());
        let query = SearchQuery::from_args(a).unwrap();
        let echo = serde_json::to_value(&query).unwrap();
        assert_eq!(
            echo,
            serde_json::json!({
                "patientId": "123",
                "code": "8310-5",
                "since": "2024-01-01T00:00:00.000Z",
                "count": 100,
                "maxItems": 200
            })
        );
    }
}
