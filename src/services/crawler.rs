//! Crawler boundary.
//!
//! Per-site extraction lives behind this trait; the pipeline tolerates any
//! implementation of it without caring how HTML is parsed.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Offer;

/// A site-specific offer crawler.
///
/// URL ownership is decided by each crawler's own pattern match: `crawl`
/// on a URL the crawler does not own must return an empty list, never an
/// error. Network faults inside `crawl` should also degrade to an empty
/// list after a single warn log; the orchestrator additionally converts a
/// propagated error into an empty contribution so one broken site never
/// aborts a run.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Short site name, used in logs and stamped onto produced offers.
    fn name(&self) -> &str;

    /// Whether this crawler owns the given search URL.
    fn matches_url(&self, url: &str) -> bool;

    /// Extract offers from the search URL, up to `max_pages` result pages.
    async fn crawl(&self, url: &str, max_pages: Option<u32>) -> Result<Vec<Offer>>;

    /// Enrich a single offer with detail-page fields (full address,
    /// move-in date). The default is identity.
    async fn fetch_details(&self, offer: Offer) -> Result<Offer> {
        Ok(offer)
    }
}
