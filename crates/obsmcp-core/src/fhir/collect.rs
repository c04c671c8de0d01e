//! Drains a page walk into normalized records

use serde_json::Value;

use super::error::FetchResult;
use super::normalize::normalize_observation;
use super::pages::BundlePages;
use crate::types::SimplifiedObservation;

/// Progress after each fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    pub pages: usize,
    pub items: usize,
}

/// Everything a completed walk produced
#[derive(Debug, Clone, Default)]
pub struct CollectedObservations {
    pub items: Vec<SimplifiedObservation>,
    pub raw_pages: Vec<Value>,
}

/// Drive `pages` to completion
///
/// Items are truncated at `max_items`, possibly in the middle of a page, and
/// no page is requested once the list is full. Any error discards what was
/// collected so far.
pub async fn collect_observations<F>(
    mut pages: BundlePages,
    max_items: usize,
    mut on_page: F,
) -> FetchResult<CollectedObservations>
where
    F: FnMut(PageProgress),
{
    let mut collected = CollectedObservations::default();

    while collected.items.len() < max_items {
        let page = match pages.next_page().await {
            Some(page) => page?,
            None => break,
        };

        for observation in page.observations() {
            let remaining = max_items - collected.items.len();
            if remaining == 0 {
                break;
            }
            collected
                .items
                .extend(normalize_observation(observation).into_iter().take(remaining));
        }

        collected.raw_pages.push(page.into_raw());
        on_page(PageProgress {
            pages: collected.raw_pages.len(),
            items: collected.items.len(),
        });
    }

    Ok(collected)
}
