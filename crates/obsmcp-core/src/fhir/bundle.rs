//! One fetched page of a FHIR searchset Bundle

use serde_json::Value;
use url::Url;

use super::error::{FetchError, FetchResult};

/// A raw Bundle as returned by the server, plus the URL it came from
#[derive(Debug, Clone)]
pub struct Page {
    url: Url,
    raw: Value,
}

impl Page {
    /// Wrap a decoded response body; it must be a JSON object
    pub fn from_json(url: Url, raw: Value) -> FetchResult<Self> {
        if !raw.is_object() {
            return Err(FetchError::invalid_bundle(url.as_str(), "expected a JSON object"));
        }
        Ok(Self { url, raw })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// `entry[].resource`, in bundle order
    pub fn resources(&self) -> impl Iterator<Item = &Value> {
        self.raw
            .get("entry")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.get("resource"))
    }

    /// Resources whose `resourceType` is Observation
    pub fn observations(&self) -> impl Iterator<Item = &Value> {
        self.resources()
            .filter(|r| r.get("resourceType").and_then(Value::as_str) == Some("Observation"))
    }

    /// The `relation: "next"` link, as written by the server
    pub fn next_link(&self) -> Option<&str> {
        self.raw
            .get("link")
            .and_then(Value::as_array)?
            .iter()
            .find(|link| link.get("relation").and_then(Value::as_str) == Some("next"))
            .and_then(|link| link.get("url"))
            .and_then(Value::as_str)
    }

    /// The next link resolved against this page's URL
    pub fn next_url(&self) -> FetchResult<Option<Url>> {
        match self.next_link() {
            None => Ok(None),
            Some(link) => self
                .url
                .join(link)
                .map(Some)
                .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", link, e))),
        }
    }
}
