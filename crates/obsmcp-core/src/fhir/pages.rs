//! Lazy walk over linked search result pages

use futures::stream::{self, Stream};
use url::Url;

use super::bundle::Page;
use super::client::FhirClient;
use super::error::FetchResult;

/// Pull-based sequence of raw Bundle pages
///
/// Each `next_page` performs at most one request. The sequence follows the
/// `next` link only while fewer than `max_items` Observation entries have
/// been seen, and is fused: after the last page or the first error it keeps
/// returning `None`.
pub struct BundlePages {
    client: FhirClient,
    next: Option<Url>,
    max_items: usize,
    seen: usize,
    fetched: usize,
}

impl BundlePages {
    pub(crate) fn new(client: FhirClient, first: Url, max_items: usize) -> Self {
        Self {
            client,
            next: Some(first),
            max_items,
            seen: 0,
            fetched: 0,
        }
    }

    /// Fetch the next page, or `None` once the walk is over
    pub async fn next_page(&mut self) -> Option<FetchResult<Page>> {
        let url = self.next.take()?;
        let page = match self.client.fetch_page(url).await {
            Ok(page) => page,
            Err(e) => return Some(Err(e)),
        };

        self.fetched += 1;
        self.seen += page.observations().count();

        if self.seen < self.max_items {
            match page.next_url() {
                Ok(next) => self.next = next,
                Err(e) => {
                    self.client.logger().warn(&format!(
                        "[BundlePages] Unusable next link on page {}: {}",
                        self.fetched, e
                    ));
                    return Some(Err(e));
                }
            }
        }

        Some(Ok(page))
    }

    /// Observation entries counted so far
    pub fn observations_seen(&self) -> usize {
        self.seen
    }

    /// Pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }

    /// Adapt into a `Stream` of pages
    pub fn into_stream(self) -> impl Stream<Item = FetchResult<Page>> {
        stream::unfold(self, |mut pages| async move {
            pages.next_page().await.map(|item| (item, pages))
        })
    }
}

impl std::fmt::Debug for BundlePages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundlePages")
            .field("next", &self.next.as_ref().map(Url::as_str))
            .field("max_items", &self.max_items)
            .field("seen", &self.seen)
            .field("fetched", &self.fetched)
            .finish()
    }
}
