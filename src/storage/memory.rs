//! In-memory deduplication store.
//!
//! Satisfies the same semantics as the persistent backend within the
//! process lifetime. Used by tests and ephemeral runs.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::Offer;
use crate::pipeline::FilterChain;
use crate::storage::{OfferRecord, OfferStore, select_recent};

#[derive(Debug, Default)]
struct Inner {
    processed: HashSet<u64>,
    records: Vec<OfferRecord>,
    last_run: Option<DateTime<Utc>>,
}

/// In-process deduplication store.
#[derive(Debug, Default)]
pub struct MemoryOfferStore {
    inner: Mutex<Inner>,
}

impl MemoryOfferStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AppError::store("store mutex poisoned"))
    }
}

#[async_trait]
impl OfferStore for MemoryOfferStore {
    async fn mark_processed(&self, id: u64) -> Result<()> {
        self.lock()?.processed.insert(id);
        Ok(())
    }

    async fn is_processed(&self, id: u64) -> Result<bool> {
        Ok(self.lock()?.processed.contains(&id))
    }

    async fn store(&self, offer: &Offer) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.records.iter().any(|r| r.id == offer.id) {
            return Ok(());
        }
        inner.records.push(OfferRecord {
            id: offer.id,
            offer: offer.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn exposes_since(&self, since: DateTime<Utc>) -> Result<Vec<Offer>> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .iter()
            .rev()
            .filter(|r| r.created_at >= since)
            .map(|r| r.offer.clone())
            .collect())
    }

    async fn recent_exposes(
        &self,
        limit: usize,
        filter: Option<&FilterChain>,
    ) -> Result<Vec<Offer>> {
        let records = self.lock()?.records.clone();
        select_recent(&records, limit, filter).await
    }

    async fn last_run_time(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.lock()?.last_run)
    }

    async fn update_last_run_time(&self) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.lock()?.last_run = Some(now);
        Ok(now)
    }
}
