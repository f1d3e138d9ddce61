//! Local filesystem deduplication store.
//!
//! Keeps the offer history in JSON files under a root directory:
//!
//! ```text
//! {root}/
//! ├── offers.json      # Stored offers in insertion order
//! ├── processed.json   # Every offer id ever marked processed
//! └── last_run.json    # Timestamp of the last completed run
//! ```
//!
//! Files are replaced atomically (write to temp, then rename), so readers
//! never observe partial records. Writes are serialized through a single
//! async mutex; concurrent orchestrator invocations cannot corrupt the
//! unique-id invariant.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::Offer;
use crate::pipeline::FilterChain;
use crate::storage::{OfferRecord, OfferStore, select_recent};

const OFFERS_FILE: &str = "offers.json";
const PROCESSED_FILE: &str = "processed.json";
const LAST_RUN_FILE: &str = "last_run.json";

/// File-backed deduplication store.
pub struct LocalOfferStore {
    root_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalOfferStore {
    /// Create a store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::store(format!("create {}: {e}", parent.display())))?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| AppError::store(format!("create {}: {e}", tmp.display())))?;
        file.write_all(bytes)
            .await
            .map_err(|e| AppError::store(format!("write {}: {e}", tmp.display())))?;
        file.flush()
            .await
            .map_err(|e| AppError::store(format!("flush {}: {e}", tmp.display())))?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::store(format!("rename to {}: {e}", path.display())))?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| AppError::store(format!("serialize {key}: {e}")))?;
        self.write_bytes(key, &bytes).await
    }

    /// Read JSON data, returning None if the file doesn't exist.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::store(format!("read {}: {e}", path.display()))),
        };
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::store(format!("corrupt {key}: {e}")))?;
        Ok(Some(value))
    }

    async fn read_records(&self) -> Result<Vec<OfferRecord>> {
        Ok(self.read_json(OFFERS_FILE).await?.unwrap_or_default())
    }

    async fn read_processed(&self) -> Result<Vec<u64>> {
        Ok(self.read_json(PROCESSED_FILE).await?.unwrap_or_default())
    }
}

#[async_trait]
impl OfferStore for LocalOfferStore {
    async fn mark_processed(&self, id: u64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut processed = self.read_processed().await?;
        if processed.contains(&id) {
            return Ok(());
        }
        processed.push(id);
        self.write_json(PROCESSED_FILE, &processed).await
    }

    async fn is_processed(&self, id: u64) -> Result<bool> {
        Ok(self.read_processed().await?.contains(&id))
    }

    async fn store(&self, offer: &Offer) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_records().await?;
        if records.iter().any(|r| r.id == offer.id) {
            return Ok(());
        }
        records.push(OfferRecord {
            id: offer.id,
            offer: offer.clone(),
            created_at: Utc::now(),
        });
        self.write_json(OFFERS_FILE, &records).await
    }

    async fn exposes_since(&self, since: DateTime<Utc>) -> Result<Vec<Offer>> {
        Ok(self
            .read_records()
            .await?
            .into_iter()
            .rev()
            .filter(|r| r.created_at >= since)
            .map(|r| r.offer)
            .collect())
    }

    async fn recent_exposes(
        &self,
        limit: usize,
        filter: Option<&FilterChain>,
    ) -> Result<Vec<Offer>> {
        let records = self.read_records().await?;
        select_recent(&records, limit, filter).await
    }

    async fn last_run_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.read_json(LAST_RUN_FILE).await
    }

    async fn update_last_run_time(&self) -> Result<DateTime<Utc>> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        self.write_json(LAST_RUN_FILE, &now).await?;
        Ok(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn offer(id: u64) -> Offer {
        let mut offer = Offer::new(id, format!("https://example.com/expose/{id}"), "Test flat");
        offer.size = format!("{} m²", id * 10);
        offer
    }

    #[tokio::test]
    async fn test_mark_processed_survives_reopen() {
        let tmp = TempDir::new().unwrap();

        {
            let store = LocalOfferStore::new(tmp.path());
            store.mark_processed(12345).await.unwrap();
        }

        let reopened = LocalOfferStore::new(tmp.path());
        assert!(reopened.is_processed(12345).await.unwrap());
        assert!(!reopened.is_processed(99).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_idempotent_across_reopen() {
        let tmp = TempDir::new().unwrap();

        {
            let store = LocalOfferStore::new(tmp.path());
            store.store(&offer(1)).await.unwrap();
            store.store(&offer(2)).await.unwrap();
        }

        let reopened = LocalOfferStore::new(tmp.path());
        reopened.store(&offer(1)).await.unwrap();

        let recent = reopened.recent_exposes(10, None).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 2);
        assert_eq!(recent[1].id, 1);
    }

    #[tokio::test]
    async fn test_last_run_marker() {
        let tmp = TempDir::new().unwrap();
        let store = LocalOfferStore::new(tmp.path());

        assert!(store.last_run_time().await.unwrap().is_none());

        let set = store.update_last_run_time().await.unwrap();
        assert_eq!(store.last_run_time().await.unwrap(), Some(set));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_store_error() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(OFFERS_FILE), b"not json")
            .await
            .unwrap();

        let store = LocalOfferStore::new(tmp.path());
        let result = store.recent_exposes(10, None).await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }

    #[tokio::test]
    async fn test_concurrent_marks_keep_ids_unique() {
        let tmp = TempDir::new().unwrap();
        let store = std::sync::Arc::new(LocalOfferStore::new(tmp.path()));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move { store.mark_processed(7).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let processed = store.read_processed().await.unwrap();
        assert_eq!(processed, vec![7]);
    }
}
