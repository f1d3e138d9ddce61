//! The orchestrator driving crawl, dedup, filter and publish per run.

use std::sync::Arc;

use futures::StreamExt;
use futures::TryStreamExt;
use futures::stream::{self, BoxStream};

use crate::error::Result;
use crate::models::{HunterConfig, Offer};
use crate::pipeline::{FilterChain, ProcessorChain};
use crate::services::{Crawler, Pubsub};
use crate::storage::OfferStore;
use crate::utils::get_domain;

/// Drives the configured crawlers through the filter and processor chains
/// and returns the accepted offers.
pub struct Hunter {
    config: Arc<HunterConfig>,
    crawlers: Vec<Arc<dyn Crawler>>,
    store: Arc<dyn OfferStore>,
    pubsub: Arc<dyn Pubsub>,
}

impl Hunter {
    /// Create a hunter. Fails fast on an invalid configuration instead of
    /// deferring the error to the first crawl.
    pub fn new(
        config: Arc<HunterConfig>,
        crawlers: Vec<Arc<dyn Crawler>>,
        store: Arc<dyn OfferStore>,
        pubsub: Arc<dyn Pubsub>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            crawlers,
            store,
            pubsub,
        })
    }

    /// Lazy merged stream over every crawler × configured URL.
    ///
    /// Pairs are fetched with bounded concurrency; `buffered` preserves
    /// the pair order, so concatenation is deterministic for a given
    /// configuration ordering. A crawl failure contributes nothing beyond
    /// one warn log: one broken site never aborts the run.
    fn offer_stream(&self, max_pages: Option<u32>) -> BoxStream<'_, Offer> {
        let jobs: Vec<(Arc<dyn Crawler>, String)> = self
            .crawlers
            .iter()
            .flat_map(|crawler| {
                self.config
                    .urls()
                    .iter()
                    .map(move |url| (Arc::clone(crawler), url.clone()))
            })
            .collect();

        let concurrency = self.config.crawler.max_concurrent.max(1);

        stream::iter(jobs)
            .map(move |(crawler, url)| async move {
                match crawler.crawl(&url, max_pages).await {
                    Ok(mut offers) => {
                        for offer in &mut offers {
                            offer
                                .crawler
                                .get_or_insert_with(|| crawler.name().to_string());
                        }
                        offers
                    }
                    Err(e) => {
                        let host = get_domain(&url).unwrap_or_else(|| url.clone());
                        log::warn!("Connection to {host} failed: {e}. Skipping this source.");
                        Vec::new()
                    }
                }
            })
            .buffered(concurrency)
            .flat_map(stream::iter)
            .boxed()
    }

    /// Trigger a new crawl of the configured URLs and collect the raw,
    /// unfiltered offers.
    pub async fn crawl_for_offers(&self, max_pages: Option<u32>) -> Vec<Offer> {
        self.offer_stream(max_pages).collect().await
    }

    /// Crawl, process and filter offers.
    ///
    /// Filter and processor chains are rebuilt on every invocation since
    /// the configuration may have changed between runs. The pipeline
    /// stream is forced exactly once here, which is what triggers the
    /// persist and publish side effects.
    pub async fn hunt_flats(&self, max_pages: Option<u32>) -> Result<Vec<Offer>> {
        let filters = FilterChain::builder()
            .read_config(&self.config.filters)
            .filter_already_seen(Arc::clone(&self.store))
            .build();
        log::debug!("Built filter chain with {} predicates", filters.len());

        let chain = ProcessorChain::builder()
            .save_all(Arc::clone(&self.store))
            .apply_filter(filters)
            .resolve_addresses(self.crawlers.clone())
            .calculate_durations()
            .publish(Arc::clone(&self.pubsub))
            .build();

        let mut accepted = Vec::new();
        {
            let mut stream = chain.process(self.offer_stream(max_pages));
            while let Some(offer) = stream.try_next().await? {
                log::info!("New offer: {}", offer.title);
                accepted.push(offer);
            }
        }

        self.store.update_last_run_time().await?;
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FiltersConfig;
    use crate::services::NopPubsub;
    use crate::storage::MemoryOfferStore;
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Crawler returning fixed offers per owned URL: ids 1-12 for the
    /// first configured URL, 13-24 for the second, sizes id × 5 m².
    struct StubCrawler;

    fn stub_offer(id: u64) -> Offer {
        let mut offer = Offer::new(
            id,
            format!("https://www.example.com/expose/{id}"),
            format!("Great flat {id}"),
        );
        offer.price = format!("{} €", 400 + id * 10);
        offer.size = format!("{} m²", id * 5);
        offer.rooms = "2".to_string();
        offer
    }

    #[async_trait]
    impl Crawler for StubCrawler {
        fn name(&self) -> &str {
            "stub"
        }

        fn matches_url(&self, url: &str) -> bool {
            url.contains("www.example.com")
        }

        async fn crawl(&self, url: &str, _max_pages: Option<u32>) -> Result<Vec<Offer>> {
            if !self.matches_url(url) {
                return Ok(Vec::new());
            }
            let ids = if url.contains("page=2") { 13..=24 } else { 1..=12 };
            Ok(ids.map(stub_offer).collect())
        }
    }

    /// Crawler whose site is always down.
    struct FailingCrawler;

    #[async_trait]
    impl Crawler for FailingCrawler {
        fn name(&self) -> &str {
            "failing"
        }

        fn matches_url(&self, _url: &str) -> bool {
            true
        }

        async fn crawl(&self, url: &str, _max_pages: Option<u32>) -> Result<Vec<Offer>> {
            Err(crate::error::AppError::fetch(url, "connection refused"))
        }
    }

    fn two_url_config(filters: FiltersConfig) -> Arc<HunterConfig> {
        Arc::new(HunterConfig {
            urls: vec![
                "https://www.example.com/liste/berlin/wohnungen/mieten".to_string(),
                "https://www.example.com/liste/berlin/wohnungen/mieten?page=2".to_string(),
            ],
            filters,
            ..HunterConfig::default()
        })
    }

    fn hunter_with(
        config: Arc<HunterConfig>,
        crawlers: Vec<Arc<dyn Crawler>>,
        store: Arc<dyn OfferStore>,
    ) -> Hunter {
        Hunter::new(config, crawlers, store, Arc::new(NopPubsub)).unwrap()
    }

    #[tokio::test]
    async fn test_hunt_marks_all_offers_processed() {
        let store: Arc<dyn OfferStore> = Arc::new(MemoryOfferStore::new());
        let hunter = hunter_with(
            two_url_config(FiltersConfig::default()),
            vec![Arc::new(StubCrawler)],
            Arc::clone(&store),
        );

        let accepted = hunter.hunt_flats(None).await.unwrap();

        assert!(accepted.len() > 4);
        assert_eq!(accepted.len(), 24);
        for offer in &accepted {
            assert!(store.is_processed(offer.id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_second_hunt_adds_no_new_ids() {
        let store: Arc<dyn OfferStore> = Arc::new(MemoryOfferStore::new());
        let hunter = hunter_with(
            two_url_config(FiltersConfig::default()),
            vec![Arc::new(StubCrawler)],
            Arc::clone(&store),
        );

        hunter.hunt_flats(None).await.unwrap();
        let first: HashSet<u64> = store
            .recent_exposes(100, None)
            .await
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();

        let accepted = hunter.hunt_flats(None).await.unwrap();
        let second: HashSet<u64> = store
            .recent_exposes(100, None)
            .await
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();

        assert!(accepted.is_empty(), "all offers were already seen");
        assert_eq!(first, second);
        assert_eq!(second.len(), 24);
    }

    #[tokio::test]
    async fn test_recent_exposes_with_size_filter() {
        let store: Arc<dyn OfferStore> = Arc::new(MemoryOfferStore::new());
        let hunter = hunter_with(
            two_url_config(FiltersConfig::default()),
            vec![Arc::new(StubCrawler)],
            Arc::clone(&store),
        );

        hunter.hunt_flats(None).await.unwrap();
        hunter.hunt_flats(None).await.unwrap();

        let filter = FilterChain::builder().max_size_filter(70.0).build();
        let saved = store.recent_exposes(10, Some(&filter)).await.unwrap();

        assert_eq!(saved.len(), 10);
        for offer in &saved {
            assert!(offer.size_value().unwrap() <= 70.0);
        }
    }

    #[tokio::test]
    async fn test_unmatched_url_yields_nothing() {
        let config = Arc::new(HunterConfig {
            urls: vec!["https://unrelated.example.org/search".to_string()],
            ..HunterConfig::default()
        });
        let store: Arc<dyn OfferStore> = Arc::new(MemoryOfferStore::new());
        let hunter = hunter_with(config, vec![Arc::new(StubCrawler)], store);

        assert!(hunter.crawl_for_offers(None).await.is_empty());
        assert!(hunter.hunt_flats(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crawl_failure_is_soft() {
        let store: Arc<dyn OfferStore> = Arc::new(MemoryOfferStore::new());
        let hunter = hunter_with(
            two_url_config(FiltersConfig::default()),
            vec![Arc::new(FailingCrawler), Arc::new(StubCrawler)],
            Arc::clone(&store),
        );

        // The broken crawler contributes nothing; the healthy one still runs.
        let accepted = hunter.hunt_flats(None).await.unwrap();
        assert_eq!(accepted.len(), 24);
    }

    #[tokio::test]
    async fn test_offers_are_stamped_with_crawler_name() {
        let store: Arc<dyn OfferStore> = Arc::new(MemoryOfferStore::new());
        let hunter = hunter_with(
            two_url_config(FiltersConfig::default()),
            vec![Arc::new(StubCrawler)],
            store,
        );

        let offers = hunter.crawl_for_offers(None).await;
        assert_eq!(offers.len(), 24);
        assert!(offers.iter().all(|o| o.crawler.as_deref() == Some("stub")));
    }

    #[tokio::test]
    async fn test_filters_applied_during_hunt() {
        let filters = FiltersConfig {
            max_size: Some(30.0),
            ..FiltersConfig::default()
        };
        let store: Arc<dyn OfferStore> = Arc::new(MemoryOfferStore::new());
        let hunter = hunter_with(
            two_url_config(filters),
            vec![Arc::new(StubCrawler)],
            Arc::clone(&store),
        );

        let accepted = hunter.hunt_flats(None).await.unwrap();

        // Sizes are id × 5, so only ids 1-6 pass a 30 m² cap.
        assert_eq!(accepted.len(), 6);

        // Every offer was persisted regardless of the filter outcome.
        assert_eq!(store.recent_exposes(100, None).await.unwrap().len(), 24);
    }

    #[tokio::test]
    async fn test_hunt_updates_last_run_marker() {
        let store: Arc<dyn OfferStore> = Arc::new(MemoryOfferStore::new());
        let hunter = hunter_with(
            two_url_config(FiltersConfig::default()),
            vec![Arc::new(StubCrawler)],
            Arc::clone(&store),
        );

        assert!(store.last_run_time().await.unwrap().is_none());
        hunter.hunt_flats(None).await.unwrap();
        assert!(store.last_run_time().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let mut config = HunterConfig::default();
        config.crawler.max_concurrent = 0;

        let result = Hunter::new(
            Arc::new(config),
            vec![Arc::new(StubCrawler)],
            Arc::new(MemoryOfferStore::new()),
            Arc::new(NopPubsub),
        );

        assert!(result.is_err());
    }
}
