//! Storage abstractions for the deduplication store.
//!
//! The store is the sole owner of persisted offer history. It remembers
//! every offer id ever seen, keeps the full payload of every stored offer,
//! and records the timestamp of the last completed pipeline run. All
//! operations are idempotent per offer id; a run that cannot reach the
//! store must abort rather than silently skip deduplication.

pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Offer;
use crate::pipeline::FilterChain;

// Re-export for convenience
pub use local::LocalOfferStore;
pub use memory::MemoryOfferStore;

/// A stored offer with its insertion timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRecord {
    /// Offer id, unique across the whole store
    pub id: u64,
    /// Full offer payload as seen at insertion time
    pub offer: Offer,
    /// When the record was first stored
    pub created_at: DateTime<Utc>,
}

/// Trait for deduplication store backends.
///
/// Retrieval operations (`exposes_since`, `recent_exposes`) return offers
/// most-recent-first. Writes must be safe under concurrent orchestrator
/// invocations; reads may be stale but never observe partial records.
#[async_trait]
pub trait OfferStore: Send + Sync {
    /// Remember an offer id. Idempotent: a second call for the same id is
    /// a no-op.
    async fn mark_processed(&self, id: u64) -> Result<()>;

    /// Whether an offer id has been marked processed before.
    async fn is_processed(&self, id: u64) -> Result<bool>;

    /// Persist a full offer payload keyed by its id. Idempotent: a second
    /// store of the same id neither duplicates nor errors.
    async fn store(&self, offer: &Offer) -> Result<()>;

    /// Offers stored at or after `since`, most-recent-first.
    async fn exposes_since(&self, since: DateTime<Utc>) -> Result<Vec<Offer>>;

    /// Up to `limit` stored offers, most-recent-first, with `filter`
    /// applied as a post-filter over the stored records.
    async fn recent_exposes(
        &self,
        limit: usize,
        filter: Option<&FilterChain>,
    ) -> Result<Vec<Offer>>;

    /// Timestamp of the last completed run, if any run completed yet.
    async fn last_run_time(&self) -> Result<Option<DateTime<Utc>>>;

    /// Set the run marker to now and return the value that was set.
    async fn update_last_run_time(&self) -> Result<DateTime<Utc>>;
}

/// Apply an optional filter chain over records, newest first, bounded by
/// `limit`. Shared by store implementations.
pub(crate) async fn select_recent(
    records: &[OfferRecord],
    limit: usize,
    filter: Option<&FilterChain>,
) -> Result<Vec<Offer>> {
    let mut selected = Vec::new();
    for record in records.iter().rev() {
        if selected.len() == limit {
            break;
        }
        let accepted = match filter {
            Some(chain) => chain.is_interesting(&record.offer).await?,
            None => true,
        };
        if accepted {
            selected.push(record.offer.clone());
        }
    }
    Ok(selected)
}
