//! Processor stages and the processor chain.
//!
//! Every offer surviving the crawl flows through an ordered sequence of
//! stages: persist, filter, enrich, publish. The chain is lazy: stages
//! consume and produce a stream, so side effects happen only when the
//! orchestrator forces the stream, and exactly once per offer because the
//! stream is consumed by move.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};

use crate::error::Result;
use crate::models::Offer;
use crate::pipeline::FilterChain;
use crate::services::{Crawler, Pubsub};
use crate::storage::OfferStore;

/// A single pipeline stage. Returning `None` drops the offer.
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, offer: Offer) -> Result<Option<Offer>>;
}

/// Persists every offer to the store, regardless of what later stages
/// decide. The store records every offer seen, not just accepted ones, so
/// the next run does not re-process offers that were filtered out.
struct SaveAllProcessor {
    store: Arc<dyn OfferStore>,
}

#[async_trait]
impl Processor for SaveAllProcessor {
    fn name(&self) -> &'static str {
        "save_all"
    }

    async fn process(&self, offer: Offer) -> Result<Option<Offer>> {
        self.store.store(&offer).await?;
        Ok(Some(offer))
    }
}

/// Drops offers failing the filter chain.
struct ApplyFilterProcessor {
    filters: FilterChain,
}

#[async_trait]
impl Processor for ApplyFilterProcessor {
    fn name(&self) -> &'static str {
        "apply_filter"
    }

    async fn process(&self, offer: Offer) -> Result<Option<Offer>> {
        if self.filters.is_interesting(&offer).await? {
            Ok(Some(offer))
        } else {
            Ok(None)
        }
    }
}

/// Enriches offers with detail-page fields via the owning crawler.
struct ResolveAddressesProcessor {
    crawlers: Vec<Arc<dyn Crawler>>,
}

#[async_trait]
impl Processor for ResolveAddressesProcessor {
    fn name(&self) -> &'static str {
        "resolve_addresses"
    }

    async fn process(&self, offer: Offer) -> Result<Option<Offer>> {
        let Some(crawler) = self.crawlers.iter().find(|c| c.matches_url(&offer.url)) else {
            return Ok(Some(offer));
        };

        match crawler.fetch_details(offer.clone()).await {
            Ok(enriched) => Ok(Some(enriched)),
            Err(e) => {
                log::warn!(
                    "Detail fetch for offer {} via {} failed: {e}. Keeping unenriched offer.",
                    offer.id,
                    crawler.name()
                );
                Ok(Some(offer))
            }
        }
    }
}

/// Derives time-on-market from the offer's `from` date.
struct CalculateDurationsProcessor;

#[async_trait]
impl Processor for CalculateDurationsProcessor {
    fn name(&self) -> &'static str {
        "calculate_durations"
    }

    async fn process(&self, mut offer: Offer) -> Result<Option<Offer>> {
        if let Some(raw) = &offer.from_date {
            match parse_listing_date(raw) {
                Some(date) => {
                    offer.durations = Some(describe_time_on_market(
                        (Utc::now().date_naive() - date).num_days(),
                    ));
                }
                None => {
                    log::debug!("Offer {}: unparseable from-date '{raw}'", offer.id);
                }
            }
        }
        Ok(Some(offer))
    }
}

/// Hands accepted offers to the pubsub channel. Delivery failure is the
/// channel's problem; the offer always passes through.
struct PublishProcessor {
    pubsub: Arc<dyn Pubsub>,
}

#[async_trait]
impl Processor for PublishProcessor {
    fn name(&self) -> &'static str {
        "publish"
    }

    async fn process(&self, offer: Offer) -> Result<Option<Offer>> {
        self.pubsub.publish(&offer).await;
        Ok(Some(offer))
    }
}

/// Ordered sequence of stages, built fresh per run.
pub struct ProcessorChain {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    pub fn builder() -> ProcessorChainBuilder {
        ProcessorChainBuilder {
            processors: Vec::new(),
        }
    }

    /// Apply all stages lazily over the offer stream.
    ///
    /// The returned stream yields `Result` items so a store fault aborts
    /// the run at the consumer. Nothing happens until the caller polls,
    /// and the stream can only be consumed once.
    pub fn process<'a>(&'a self, offers: BoxStream<'a, Offer>) -> BoxStream<'a, Result<Offer>> {
        let initial: BoxStream<'a, Result<Offer>> = offers.map(Ok).boxed();
        self.processors.iter().fold(initial, |stream, processor| {
            stream
                .try_filter_map(move |offer| async move { processor.process(offer).await })
                .boxed()
        })
    }
}

/// Fluent builder for a processor chain. Stage order is the call order;
/// the orchestrator always composes persist → filter → enrich → publish.
pub struct ProcessorChainBuilder {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorChainBuilder {
    pub fn save_all(mut self, store: Arc<dyn OfferStore>) -> Self {
        self.processors.push(Box::new(SaveAllProcessor { store }));
        self
    }

    pub fn apply_filter(mut self, filters: FilterChain) -> Self {
        self.processors
            .push(Box::new(ApplyFilterProcessor { filters }));
        self
    }

    pub fn resolve_addresses(mut self, crawlers: Vec<Arc<dyn Crawler>>) -> Self {
        self.processors
            .push(Box::new(ResolveAddressesProcessor { crawlers }));
        self
    }

    pub fn calculate_durations(mut self) -> Self {
        self.processors.push(Box::new(CalculateDurationsProcessor));
        self
    }

    pub fn publish(mut self, pubsub: Arc<dyn Pubsub>) -> Self {
        self.processors.push(Box::new(PublishProcessor { pubsub }));
        self
    }

    pub fn build(self) -> ProcessorChain {
        ProcessorChain {
            processors: self.processors,
        }
    }
}

/// Parse a site-rendered listing date.
fn parse_listing_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];
    let trimmed = raw.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

fn describe_time_on_market(days: i64) -> String {
    if days >= 0 {
        format!("{days} days on market")
    } else {
        format!("available in {} days", -days)
    }
}
