//! Progress Store
//!
//! Durable (user, module) → `ProgressRecord` mapping. The MongoDB backend
//! lives in `crate::db`; the in-memory backend here serves dev mode and
//! tests.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::progress::model::ProgressRecord;
use crate::types::{BridgeError, Result};

/// Trait for progress persistence (allows different backends)
#[async_trait::async_trait]
pub trait ProgressStore: Send + Sync {
    /// Load the record for a (user, module) pair
    async fn find(&self, user_id: &str, module_id: &str) -> Result<Option<ProgressRecord>>;

    /// Persist a record for a pair that has no record yet
    async fn insert(&self, record: &ProgressRecord) -> Result<()>;

    /// Replace the mutable fields of an existing record
    async fn update(&self, record: &ProgressRecord) -> Result<()>;

    /// All records of a user, in storage order
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<ProgressRecord>>;

    /// Up to `limit` records across all users, in storage order
    async fn scan(&self, limit: usize) -> Result<Vec<ProgressRecord>>;

    /// Backend name for health reporting
    fn backend(&self) -> &'static str;
}

/// Simple in-memory progress store.
///
/// Records keep insertion order, which the local leaderboard relies on
/// for tie-breaking.
pub struct InMemoryProgressStore {
    records: Arc<RwLock<Vec<ProgressRecord>>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn find(&self, user_id: &str, module_id: &str) -> Result<Option<ProgressRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.user_id == user_id && r.module_id == module_id)
            .cloned())
    }

    async fn insert(&self, record: &ProgressRecord) -> Result<()> {
        let mut records = self.records.write().await;
        // Mirror the unique (userId, moduleId) index of the Mongo backend
        if records
            .iter()
            .any(|r| r.user_id == record.user_id && r.module_id == record.module_id)
        {
            return Err(BridgeError::Database(format!(
                "duplicate progress record for {}/{}",
                record.user_id, record.module_id
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &ProgressRecord) -> Result<()> {
        let mut records = self.records.write().await;
        match records
            .iter_mut()
            .find(|r| r.user_id == record.user_id && r.module_id == record.module_id)
        {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(BridgeError::NotFound(format!(
                "progress record {}/{}",
                record.user_id, record.module_id
            ))),
        }
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<ProgressRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn scan(&self, limit: usize) -> Result<Vec<ProgressRecord>> {
        Ok(self.records.read().await.iter().take(limit).cloned().collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryProgressStore::new();
        store.insert(&ProgressRecord::new("u1", "m1")).await.unwrap();

        assert!(store.find("u1", "m1").await.unwrap().is_some());
        assert!(store.find("u1", "m2").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_pair() {
        let store = InMemoryProgressStore::new();
        store.insert(&ProgressRecord::new("u1", "m1")).await.unwrap();
        assert!(store.insert(&ProgressRecord::new("u1", "m1")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let store = InMemoryProgressStore::new();
        let mut record = ProgressRecord::new("u1", "m1");
        store.insert(&record).await.unwrap();

        record.total_points = 40;
        store.update(&record).await.unwrap();

        assert_eq!(store.find("u1", "m1").await.unwrap().unwrap().total_points, 40);
    }

    #[tokio::test]
    async fn test_update_missing_record_fails() {
        let store = InMemoryProgressStore::new();
        assert!(store.update(&ProgressRecord::new("u1", "m1")).await.is_err());
    }

    #[tokio::test]
    async fn test_scan_respects_limit_and_order() {
        let store = InMemoryProgressStore::new();
        for module in ["a", "b", "c"] {
            store.insert(&ProgressRecord::new("u1", module)).await.unwrap();
        }

        let scanned = store.scan(2).await.unwrap();
        let modules: Vec<_> = scanned.iter().map(|r| r.module_id.as_str()).collect();
        assert_eq!(modules, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_find_by_user_filters() {
        let store = InMemoryProgressStore::new();
        store.insert(&ProgressRecord::new("u1", "a")).await.unwrap();
        store.insert(&ProgressRecord::new("u2", "a")).await.unwrap();
        store.insert(&ProgressRecord::new("u1", "b")).await.unwrap();

        assert_eq!(store.find_by_user("u1").await.unwrap().len(), 2);
        assert!(store.find_by_user("u3").await.unwrap().is_empty());
    }
}
