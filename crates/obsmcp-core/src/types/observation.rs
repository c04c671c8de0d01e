//! Simplified Observation record returned to tool callers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The coding an Observation (or component) was classified with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl CodeRef {
    /// Whether the coding system is LOINC (case-insensitive substring match)
    pub fn is_loinc(&self) -> bool {
        self.system
            .as_deref()
            .map(|s| s.to_ascii_lowercase().contains("loinc"))
            .unwrap_or(false)
    }
}

/// One measurement extracted from a FHIR Observation
///
/// A parent Observation yields one record for itself and one per component,
/// each only when value, unit and code were all present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// LOINC code, set only when the coding system is LOINC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loinc: Option<String>,
    pub code: CodeRef,
    /// Number, string or boolean exactly as it appeared in the resource
    pub value: Value,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}
