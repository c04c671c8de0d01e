//! Observation normalization
//!
//! FHIR Observations carry their measurement in one of several `value[x]`
//! shapes and their timestamp in one of several `effective[x]` shapes. The
//! tables below fix the lookup order; the first present (non-null) entry
//! wins.

use serde_json::Value;

use crate::types::{CodeRef, SimplifiedObservation};

/// Timestamp sources, in precedence order
pub const WHEN_FIELDS: [&str; 4] = [
    "/effectiveDateTime",
    "/effectivePeriod/end",
    "/effectiveInstant",
    "/issued",
];

/// Measurement value sources, in precedence order
pub const VALUE_FIELDS: [&str; 5] = [
    "/valueQuantity/value",
    "/valueCodeableConcept/coding/0/code",
    "/valueString",
    "/valueInteger",
    "/valueBoolean",
];

/// Unit sources, in precedence order
pub const UNIT_FIELDS: [&str; 3] = [
    "/valueQuantity/unit",
    "/valueQuantity/code",
    "/valueCodeableConcept/coding/0/display",
];

/// The coding that classifies a candidate
pub const CODING_FIELD: &str = "/code/coding/0";

/// Category sources on the parent resource, in precedence order
pub const CATEGORY_FIELDS: [&str; 2] = ["/category/0/coding/0/code", "/category/0/text"];

/// Map one raw Observation to its simplified records
///
/// The resource itself is the first candidate, followed by each entry of
/// `component` in source order. A candidate produces a record only when it
/// has a value, a unit and a coding; incomplete candidates are dropped.
pub fn normalize_observation(resource: &Value) -> Vec<SimplifiedObservation> {
    let id = text_at(resource, &["/id"]);
    let when = text_at(resource, &WHEN_FIELDS);
    let status = text_at(resource, &["/status"]);
    let category = text_at(resource, &CATEGORY_FIELDS);

    let components = resource
        .get("component")
        .and_then(Value::as_array)
        .map(|c| c.as_slice())
        .unwrap_or_default();

    std::iter::once(resource)
        .chain(components.iter())
        .filter_map(|candidate| {
            let (value, unit, code) = extract_triple(candidate)?;
            let loinc = if code.is_loinc() { code.code.clone() } else { None };
            Some(SimplifiedObservation {
                id: id.clone(),
                loinc,
                code,
                value,
                unit,
                when: when.clone(),
                status: status.clone(),
                category: category.clone(),
            })
        })
        .collect()
}

/// (value, unit, code) of one candidate, if all three are present
fn extract_triple(candidate: &Value) -> Option<(Value, String, CodeRef)> {
    let value = first_present(candidate, &VALUE_FIELDS)?.clone();
    let unit = text_at(candidate, &UNIT_FIELDS)?;
    let coding = candidate.pointer(CODING_FIELD).filter(|c| c.is_object())?;

    let code = CodeRef {
        system: text_at(coding, &["/system"]),
        code: text_at(coding, &["/code"]),
        display: text_at(coding, &["/display"]),
    };
    Some((value, unit, code))
}

fn first_present<'a>(resource: &'a Value, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .filter_map(|pointer| resource.pointer(pointer))
        .find(|v| !v.is_null())
}

fn text_at(resource: &Value, fields: &[&str]) -> Option<String> {
    match first_present(resource, fields)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
