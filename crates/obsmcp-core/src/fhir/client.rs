//! HTTP client for the upstream FHIR server

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::bundle::Page;
use super::collect::{collect_observations, PageProgress};
use super::error::{FetchError, FetchResult};
use super::pages::BundlePages;
use crate::credentials::CredentialCache;
use crate::logging::Logger;
use crate::types::{SearchQuery, SimplifiedObservation};
use crate::{log_debug, log_info, log_warn};

/// Media type requested from the FHIR server
pub const FHIR_JSON: &str = "application/fhir+json";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one `search_observations` call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationSearchResult {
    pub query: SearchQuery,
    pub total_returned: usize,
    pub items: Vec<SimplifiedObservation>,
    pub raw_pages: Vec<Value>,
}

/// Client for Observation searches
///
/// Cheap to clone; clones share the connection pool and the credential
/// cache.
#[derive(Clone)]
pub struct FhirClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<CredentialCache>,
    logger: Arc<dyn Logger>,
}

impl FhirClient {
    /// Create a client with the default timeout
    pub fn new(
        base_url: &str,
        credentials: Arc<CredentialCache>,
        logger: Arc<dyn Logger>,
    ) -> FetchResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT, credentials, logger)
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<CredentialCache>,
        logger: Arc<dyn Logger>,
    ) -> FetchResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(format!(
                "{}: not a hierarchical URL",
                base_url
            )));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            credentials,
            logger,
        })
    }

    pub(crate) fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    /// `<base>/Observation?patient=..&combo-code=..&_count=..[&date=ge..][&date=le..]`
    pub fn observation_search_url(&self, query: &SearchQuery) -> FetchResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("Observation");

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .clear()
                .append_pair("patient", query.patient_id())
                .append_pair("combo-code", query.code())
                .append_pair("_count", &query.count().to_string());
            if let Some(since) = query.since() {
                pairs.append_pair("date", &format!("ge{}", since));
            }
            if let Some(until) = query.until() {
                pairs.append_pair("date", &format!("le{}", until));
            }
        }

        Ok(url)
    }

    /// Lazy page walk for `query`; nothing is fetched until the first pull
    pub fn search_pages(&self, query: &SearchQuery) -> FetchResult<BundlePages> {
        let url = self.observation_search_url(query)?;
        Ok(BundlePages::new(self.clone(), url, query.max_items() as usize))
    }

    /// GET one Bundle page
    pub async fn fetch_page(&self, url: Url) -> FetchResult<Page> {
        let authorization = self.credentials.authorization_header()?;
        log_debug!(self.logger, "[FhirClient] GET {}", url);

        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, FHIR_JSON)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log_warn!(self.logger, "[FhirClient] {} answered {}", url, status);
            return Err(FetchError::upstream(status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        let raw: Value = serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::invalid_bundle(url.as_str(), e.to_string()))?;
        Page::from_json(url, raw)
    }

    /// Run a complete search, reporting progress after every page
    pub async fn search_observations<F>(
        &self,
        query: &SearchQuery,
        on_page: F,
    ) -> FetchResult<ObservationSearchResult>
    where
        F: FnMut(PageProgress),
    {
        let pages = self.search_pages(query)?;
        let collected = collect_observations(pages, query.max_items() as usize, on_page).await?;

        log_info!(
            self.logger,
            "[FhirClient] Patient {} code {}: {} item(s) from {} page(s)",
            query.patient_id(),
            query.code(),
            collected.items.len(),
            collected.raw_pages.len()
        );

        Ok(ObservationSearchResult {
            query: query.clone(),
            total_returned: collected.items.len(),
            items: collected.items,
            raw_pages: collected.raw_pages,
        })
    }
}

impl std::fmt::Debug for FhirClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhirClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialResult, IdentityClaims, TokenSigner};
    use crate::logging::NoOpLogger;
    use crate::types::SearchArgs;
    use futures::StreamExt;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticSigner(AtomicUsize);

    impl TokenSigner for StaticSigner {
        fn sign(&self, _claims: &Map<String, Value>) -> CredentialResult<String> {
            Ok(format!("tok{}", self.0.fetch_add(1, Ordering::SeqCst)))
        }
    }

    fn client(base: &str) -> FhirClient {
        let cache = CredentialCache::new(
            IdentityClaims::admin("svc"),
            Arc::new(StaticSigner(AtomicUsize::new(0))),
            Arc::new(NoOpLogger),
        );
        FhirClient::new(base, Arc::new(cache), Arc::new(NoOpLogger)).unwrap()
    }

    fn observation(i: usize) -> Value {
        json!({
            "resource": {
                "resourceType": "Observation",
                "id": format!("obs-{}", i),
                "status": "final",
                "code": {"coding": [{"system": "http://loinc.org", "code": "8310-5"}]},
                "valueQuantity": {"value": 37.0, "unit": "Cel"},
                "effectiveDateTime": "2024-01-01T00:00:00Z"
            }
        })
    }

    fn bundle(start: usize, n: usize, next: Option<String>) -> Value {
        let entries: Vec<Value> = (start..start + n).map(observation).collect();
        let mut bundle = json!({"resourceType": "Bundle", "type": "searchset", "entry": entries});
        if let Some(next) = next {
            bundle["link"] = json!([{"relation": "next", "url": next}]);
        }
        bundle
    }

    fn query(max_items: i64) -> SearchQuery {
        SearchQuery::from_args(SearchArgs {
            patient_id: "p1".to_string(),
            code: "8310-5".to_string(),
            max_items: Some(max_items),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_search_url_parameters() {
        let client = client("http://fhir.test/r4/");
        let query = SearchQuery::from_args(SearchArgs {
            patient_id: "p 1".to_string(),
            code: "http://loinc.org|8310-5".to_string(),
            since: Some("2024-01-01".to_string()),
            until: Some("2024-02-01T12:00:00+02:00".to_string()),
            count: Some(50),
            max_items: None,
        })
        .unwrap();

        let url = client.observation_search_url(&query).unwrap();
        assert_eq!(url.path(), "/r4/Observation");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("patient".to_string(), "p 1".to_string()),
                ("combo-code".to_string(), "http://loinc.org|8310-5".to_string()),
                ("_count".to_string(), "50".to_string()),
                ("date".to_string(), "ge2024-01-01T00:00:00.000Z".to_string()),
                ("date".to_string(), "le2024-02-01T10:00:00.000Z".to_string()),
            ]
        );
    }

    #[test]
    fn test_search_url_without_dates() {
        let client = client("http://fhir.test/r4");
        let url = client.observation_search_url(&query(10)).unwrap();
        assert_eq!(
            url.as_str(),
            "http://fhir.test/r4/Observation?patient=p1&combo-code=8310-5&_count=100"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let cache = CredentialCache::new(
            IdentityClaims::admin("svc"),
            Arc::new(StaticSigner(AtomicUsize::new(0))),
            Arc::new(NoOpLogger),
        );
        let err = FhirClient::new("mailto:nobody", Arc::new(cache), Arc::new(NoOpLogger)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_budget_stops_page_walk() {
        let server = MockServer::start().await;
        let next2 = format!("{}/r4/Observation?page=2", server.uri());
        let next3 = format!("{}/r4/Observation?page=3", server.uri());

        Mock::given(method("GET"))
            .and(path("/r4/Observation"))
            .and(query_param("patient", "p1"))
            .and(header("accept", FHIR_JSON))
            .and(header("authorization", "Bearer tok0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle(0, 80, Some(next2))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r4/Observation"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle(80, 80, Some(next3))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r4/Observation"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle(160, 80, None)))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&format!("{}/r4", server.uri()));
        let mut progress = Vec::new();
        let result = client
            .search_observations(&query(150), |p| progress.push(p))
            .await
            .unwrap();

        assert_eq!(result.total_returned, 150);
        assert_eq!(result.items.len(), 150);
        assert_eq!(result.raw_pages.len(), 2);
        assert_eq!(result.items[149].id.as_deref(), Some("obs-149"));
        assert_eq!(
            progress,
            vec![PageProgress { pages: 1, items: 80 }, PageProgress { pages: 2, items: 150 }]
        );

        let body = serde_json::to_value(&result).unwrap();
        assert_eq!(body["totalReturned"], 150);
        assert_eq!(body["query"]["patientId"], "p1");
        assert_eq!(body["rawPages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_page_failure_aborts() {
        let server = MockServer::start().await;
        let next2 = format!("{}/r4/Observation?page=2", server.uri());

        Mock::given(method("GET"))
            .and(query_param("patient", "p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle(0, 10, Some(next2))))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client(&format!("{}/r4", server.uri()));
        let err = client
            .search_observations(&query(200), |_| {})
            .await
            .unwrap_err();

        match err {
            FetchError::UpstreamHttp { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unusable_next_link_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("patient", "p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle(
                0,
                1,
                Some("http://[::1".to_string()),
            )))
            .mount(&server)
            .await;

        let client = client(&format!("{}/r4", server.uri()));
        let err = client
            .search_observations(&query(200), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));

        let mut pages = client.search_pages(&query(200)).unwrap();
        assert!(matches!(
            pages.next_page().await,
            Some(Err(FetchError::InvalidUrl(_)))
        ));
        assert!(pages.next_page().await.is_none());
        assert_eq!(pages.pages_fetched(), 1);
    }

    #[tokio::test]
    async fn test_relative_next_link_and_fused_stream() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/r4/Observation"))
            .and(query_param("patient", "p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle(
                0,
                2,
                Some("Observation?page=2".to_string()),
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r4/Observation"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle(2, 1, None)))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&format!("{}/r4", server.uri()));
        let mut pages = client.search_pages(&query(200)).unwrap();

        let first = pages.next_page().await.unwrap().unwrap();
        assert_eq!(first.observations().count(), 2);
        let second = pages.next_page().await.unwrap().unwrap();
        assert!(second.url().as_str().ends_with("/r4/Observation?page=2"));
        assert!(pages.next_page().await.is_none());
        assert!(pages.next_page().await.is_none());
        assert_eq!(pages.observations_seen(), 3);
        assert_eq!(pages.pages_fetched(), 2);

        let streamed: Vec<_> = client
            .search_pages(&query(200))
            .unwrap()
            .into_stream()
            .collect()
            .await;
        assert_eq!(streamed.len(), 2);
        assert!(streamed.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid_bundle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html/>"))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let mut pages = client.search_pages(&query(10)).unwrap();
        assert!(matches!(
            pages.next_page().await,
            Some(Err(FetchError::InvalidBundle { .. }))
        ));
        assert!(pages.next_page().await.is_none());
    }

    #[tokio::test]
    async fn test_components_count_against_budget() {
        let server = MockServer::start().await;
        let panel = json!({
            "resourceType": "Bundle",
            "entry": [{
                "resource": {
                    "resourceType": "Observation",
                    "id": "bp",
                    "code": {"coding": [{"system": "http://loinc.org", "code": "85354-9"}]},
                    "component": [
                        {"code": {"coding": [{"code": "8480-6"}]}, "valueQuantity": {"value": 120, "unit": "mmHg"}},
                        {"code": {"coding": [{"code": "8462-4"}]}, "valueQuantity": {"value": 80, "unit": "mmHg"}}
                    ]
                }
            }]
        });
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(panel))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let result = client.search_observations(&query(1), |_| {}).await.unwrap();
        assert_eq!(result.total_returned, 1);
        assert_eq!(result.items[0].code.code.as_deref(), Some("8480-6"));
    }
}
