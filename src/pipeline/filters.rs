//! Offer filters and the filter chain.
//!
//! A chain is an ordered set of predicates built fresh per run from the
//! current configuration, optionally extended with the already-seen
//! predicate backed by the deduplication store. Evaluation short-circuits
//! on the first rejection. A field that fails numeric parsing is a logged
//! rejection, never an error; only store faults propagate.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FiltersConfig, Offer};
use crate::storage::OfferStore;

/// A single named predicate over an offer.
#[async_trait]
pub trait OfferFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the offer survives this predicate.
    async fn is_interesting(&self, offer: &Offer) -> Result<bool>;
}

enum Bound {
    Max,
    Min,
}

/// Inclusive numeric threshold over one offer field.
struct NumericFilter {
    name: &'static str,
    bound: Bound,
    threshold: f64,
    field: fn(&Offer) -> Option<f64>,
}

#[async_trait]
impl OfferFilter for NumericFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn is_interesting(&self, offer: &Offer) -> Result<bool> {
        match (self.field)(offer) {
            Some(value) => Ok(match self.bound {
                Bound::Max => value <= self.threshold,
                Bound::Min => value >= self.threshold,
            }),
            None => {
                log::warn!(
                    "Offer {}: no parseable value for {}, rejecting",
                    offer.id,
                    self.name
                );
                Ok(false)
            }
        }
    }
}

/// Rejects offers whose title contains a blacklisted word.
struct TitleFilter {
    needles: Vec<String>,
}

#[async_trait]
impl OfferFilter for TitleFilter {
    fn name(&self) -> &'static str {
        "excluded_titles"
    }

    async fn is_interesting(&self, offer: &Offer) -> Result<bool> {
        let title = offer.title.to_lowercase();
        Ok(!self.needles.iter().any(|needle| title.contains(needle)))
    }
}

/// Rejects offers whose id the store has seen before, and marks unseen
/// ids as processed on first sight.
struct AlreadySeenFilter {
    store: Arc<dyn OfferStore>,
}

#[async_trait]
impl OfferFilter for AlreadySeenFilter {
    fn name(&self) -> &'static str {
        "already_seen"
    }

    async fn is_interesting(&self, offer: &Offer) -> Result<bool> {
        if self.store.is_processed(offer.id).await? {
            return Ok(false);
        }
        self.store.mark_processed(offer.id).await?;
        Ok(true)
    }
}

/// Ordered set of predicates; accepts an offer iff all predicates accept.
pub struct FilterChain {
    filters: Vec<Box<dyn OfferFilter>>,
}

impl FilterChain {
    pub fn builder() -> FilterChainBuilder {
        FilterChainBuilder {
            filters: Vec::new(),
        }
    }

    /// True iff every predicate accepts. Short-circuits on the first
    /// rejection.
    pub async fn is_interesting(&self, offer: &Offer) -> Result<bool> {
        for filter in &self.filters {
            if !filter.is_interesting(offer).await? {
                log::debug!("Offer {} rejected by {}", offer.id, filter.name());
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Fluent builder for a filter chain.
pub struct FilterChainBuilder {
    filters: Vec<Box<dyn OfferFilter>>,
}

impl FilterChainBuilder {
    /// Add every threshold configured in `config`.
    pub fn read_config(mut self, config: &FiltersConfig) -> Self {
        if let Some(v) = config.max_price {
            self = self.max_price_filter(v);
        }
        if let Some(v) = config.min_price {
            self = self.min_price_filter(v);
        }
        if let Some(v) = config.max_size {
            self = self.max_size_filter(v);
        }
        if let Some(v) = config.min_size {
            self = self.min_size_filter(v);
        }
        if let Some(v) = config.max_rooms {
            self = self.max_rooms_filter(v);
        }
        if let Some(v) = config.min_rooms {
            self = self.min_rooms_filter(v);
        }
        if !config.excluded_titles.is_empty() {
            self.filters.push(Box::new(TitleFilter {
                needles: config
                    .excluded_titles
                    .iter()
                    .map(|w| w.to_lowercase())
                    .collect(),
            }));
        }
        self
    }

    pub fn max_price_filter(self, threshold: f64) -> Self {
        self.numeric("max_price", Bound::Max, threshold, Offer::price_value)
    }

    pub fn min_price_filter(self, threshold: f64) -> Self {
        self.numeric("min_price", Bound::Min, threshold, Offer::price_value)
    }

    pub fn max_size_filter(self, threshold: f64) -> Self {
        self.numeric("max_size", Bound::Max, threshold, Offer::size_value)
    }

    pub fn min_size_filter(self, threshold: f64) -> Self {
        self.numeric("min_size", Bound::Min, threshold, Offer::size_value)
    }

    pub fn max_rooms_filter(self, threshold: f64) -> Self {
        self.numeric("max_rooms", Bound::Max, threshold, Offer::rooms_value)
    }

    pub fn min_rooms_filter(self, threshold: f64) -> Self {
        self.numeric("min_rooms", Bound::Min, threshold, Offer::rooms_value)
    }

    /// Add the already-seen predicate backed by the deduplication store.
    pub fn filter_already_seen(mut self, store: Arc<dyn OfferStore>) -> Self {
        self.filters.push(Box::new(AlreadySeenFilter { store }));
        self
    }

    pub fn build(self) -> FilterChain {
        FilterChain {
            filters: self.filters,
        }
    }

    fn numeric(
        mut self,
        name: &'static str,
        bound: Bound,
        threshold: f64,
        field: fn(&Offer) -> Option<f64>,
    ) -> Self {
        self.filters.push(Box::new(NumericFilter {
            name,
            bound,
            threshold,
            field,
        }));
        self
    }
}
