//! In-memory document store.
//!
//! Uses `DashMap` so the compare-and-swap in `put` happens under the
//! per-key entry lock.

use async_trait::async_trait;
use common::Error;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::{DocumentStore, Precondition, Versioned};

type DocKey = (String, String);

/// Thread-safe store, cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: Arc<DashMap<DocKey, Versioned>>,
    archives: Arc<DashMap<String, Vec<(String, Value)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything appended to `collection`, in insertion order.
    pub fn archived(&self, collection: &str) -> Vec<Value> {
        self.archives
            .get(collection)
            .map(|docs| docs.iter().map(|(_, v)| v.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of keyed documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.docs.iter().filter(|e| e.key().0 == collection).count()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty() && self.archives.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Versioned>, Error> {
        Ok(self
            .docs
            .get(&(collection.to_string(), key.to_string()))
            .map(|doc| doc.clone()))
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        data: Value,
        precondition: Precondition,
    ) -> Result<u64, Error> {
        match self.docs.entry((collection.to_string(), key.to_string())) {
            Entry::Occupied(mut entry) => {
                precondition.check(Some(entry.get().version), collection, key)?;
                let version = entry.get().version + 1;
                entry.insert(Versioned { version, data });
                Ok(version)
            }
            Entry::Vacant(entry) => {
                precondition.check(None, collection, key)?;
                entry.insert(Versioned { version: 1, data });
                Ok(1)
            }
        }
    }

    async fn append(&self, collection: &str, data: Value) -> Result<String, Error> {
        let id = Uuid::new_v4().to_string();
        self.archives
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), data));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("cache", "loc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_versioned_writes() {
        let store = MemoryStore::new();

        let v1 = store
            .put("cache", "loc", json!({"n": 1}), Precondition::MustNotExist)
            .await
            .unwrap();
        assert_eq!(v1, 1);

        let v2 = store
            .put("cache", "loc", json!({"n": 2}), Precondition::Version(1))
            .await
            .unwrap();
        assert_eq!(v2, 2);

        let doc = store.get("cache", "loc").await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.data, json!({"n": 2}));
        assert_eq!(store.len("cache"), 1);
    }

    #[tokio::test]
    async fn test_stale_write_rejected() {
        let store = MemoryStore::new();
        store
            .put("cache", "loc", json!({"n": 1}), Precondition::MustNotExist)
            .await
            .unwrap();
        store
            .put("cache", "loc", json!({"n": 2}), Precondition::Version(1))
            .await
            .unwrap();

        let err = store
            .put("cache", "loc", json!({"n": 3}), Precondition::Version(1))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let err = store
            .put("cache", "loc", json!({"n": 3}), Precondition::MustNotExist)
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let doc = store.get("cache", "loc").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_append_keeps_order_and_ids() {
        let store = MemoryStore::new();
        let a = store.append("raw", json!(1)).await.unwrap();
        let b = store.append("raw", json!(2)).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(store.archived("raw"), vec![json!(1), json!(2)]);
        assert!(store.archived("other").is_empty());
        assert_eq!(store.len("raw"), 0);
    }
}
