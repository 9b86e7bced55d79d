//! Merge a new snapshot into its location's cache record.

use chrono::Utc;
use common::{CacheRecord, Error};
use doc_store::{run_transaction, DocumentStore};
use std::sync::Arc;
use tracing::debug;

use crate::analytics::PressureAnalyzer;
use crate::history::HistoryWindow;
use crate::reading::Reading;

/// Pure merge step: append, evict, analyze, replace `current`.
///
/// An absent prior record starts from an empty history.
pub fn merge_record<R: Reading>(
    prior: Option<CacheRecord<R, R::Point>>,
    snapshot: &R,
    history_cap: usize,
    analyzer: &PressureAnalyzer,
) -> CacheRecord<R, R::Point> {
    let stored = prior.map(|r| r.history).unwrap_or_default();
    let mut window = HistoryWindow::from_points(stored, history_cap);

    window.append(snapshot.to_point());
    let evicted = window.evict_to_capacity();
    if evicted > 0 {
        debug!(
            family = R::FAMILY,
            location = snapshot.location_id(),
            evicted,
            "history trimmed"
        );
    }

    let analysis = snapshot.analyze(analyzer, &window);

    CacheRecord {
        last_updated: Utc::now(),
        current: snapshot.clone(),
        analysis,
        history: window.into_points(),
    }
}

/// Transactional cache writer for one family's collection.
#[derive(Clone)]
pub struct CacheMerger {
    store: Arc<dyn DocumentStore>,
    collection: String,
    history_cap: usize,
    max_attempts: u32,
    analyzer: PressureAnalyzer,
}

impl CacheMerger {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        history_cap: usize,
        max_attempts: u32,
        analyzer: PressureAnalyzer,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            history_cap,
            max_attempts,
            analyzer,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Read-modify-write the record for `location_id`. Concurrent writers
    /// to the same record are serialized by retrying on version conflicts.
    pub async fn merge<R: Reading>(
        &self,
        location_id: &str,
        snapshot: &R,
    ) -> Result<CacheRecord<R, R::Point>, Error> {
        run_transaction(
            self.store.as_ref(),
            &self.collection,
            location_id,
            self.max_attempts,
            |prior: Option<CacheRecord<R, R::Point>>| {
                Ok(merge_record(prior, snapshot, self.history_cap, &self.analyzer))
            },
        )
        .await
    }
}
