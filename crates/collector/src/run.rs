//! One collection pass over every configured location.

use chrono::Utc;
use common::config::LocationConfig;
use common::Error;
use doc_store::DocumentStore;
use futures_util::stream::{self, StreamExt};
use google_client::{Fetcher, IntoSnapshot};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use crate::merge::CacheMerger;
use crate::reading::Reading;

/// Where in the per-location pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Map,
    Archive,
    Merge,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Map => "map",
            Stage::Archive => "archive",
            Stage::Merge => "merge",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct LocationFailure {
    pub location: String,
    pub stage: Stage,
    pub error: Error,
}

/// Outcome of a pass, in configured location order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<LocationFailure>,
}

impl RunReport {
    /// A pass succeeds when at least one location made it through.
    pub fn is_success(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

pub struct CollectionRun<F> {
    fetcher: F,
    store: Arc<dyn DocumentStore>,
    merger: CacheMerger,
    raw_collection: String,
    locations: Vec<LocationConfig>,
    concurrency: usize,
}

impl<F> CollectionRun<F>
where
    F: Fetcher,
    F::Raw: IntoSnapshot,
    <F::Raw as IntoSnapshot>::Snapshot: Reading,
{
    pub fn new(
        fetcher: F,
        store: Arc<dyn DocumentStore>,
        merger: CacheMerger,
        raw_collection: impl Into<String>,
        locations: Vec<LocationConfig>,
    ) -> Self {
        Self {
            fetcher,
            store,
            merger,
            raw_collection: raw_collection.into(),
            locations,
            concurrency: 1,
        }
    }

    /// Locations processed at once. 1 keeps the pass strictly serial.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch, map, archive and merge a single location.
    pub async fn collect_location(
        &self,
        location: &LocationConfig,
    ) -> Result<<F::Raw as IntoSnapshot>::Snapshot, LocationFailure> {
        let fail = |stage: Stage| {
            move |error: Error| LocationFailure {
                location: location.id.clone(),
                stage,
                error,
            }
        };

        let raw = self.fetcher.fetch(location).await.map_err(fail(Stage::Fetch))?;

        let snapshot = raw
            .into_snapshot(&location.id, Utc::now())
            .map_err(fail(Stage::Map))?;

        let doc = serde_json::to_value(&snapshot)
            .map_err(Error::from)
            .map_err(fail(Stage::Archive))?;
        self.store
            .append(&self.raw_collection, doc)
            .await
            .map_err(fail(Stage::Archive))?;

        self.merger
            .merge(&location.id, &snapshot)
            .await
            .map_err(fail(Stage::Merge))?;

        Ok(snapshot)
    }

    /// Process every location. A failure is logged and recorded; it never
    /// stops the remaining locations.
    pub async fn run(&self) -> RunReport {
        let family = <<F::Raw as IntoSnapshot>::Snapshot as Reading>::FAMILY;
        info!(
            family,
            locations = self.locations.len(),
            concurrency = self.concurrency,
            "Starting collection run"
        );

        let outcomes: Vec<_> = stream::iter(self.locations.iter())
            .map(|location| self.collect_location(location))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = RunReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(snapshot) => {
                    info!(
                        family,
                        location = snapshot.location_id(),
                        collected_at = %snapshot.collected_at().to_rfc3339(),
                        "Processed"
                    );
                    report.succeeded.push(snapshot.location_id().to_string());
                }
                Err(failure) => {
                    error!(
                        family,
                        location = %failure.location,
                        stage = %failure.stage,
                        error = %failure.error,
                        "Location failed"
                    );
                    report.failed.push(failure);
                }
            }
        }

        info!(
            family,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Collection run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::PressureAnalyzer;
    use async_trait::async_trait;
    use common::WeatherCacheRecord;
    use doc_store::{MemoryStore, Precondition, Versioned};
    use google_client::CurrentConditionsResponse;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Per-location canned outcome: a pressure value or an HTTP status.
    struct FakeFetcher {
        outcomes: HashMap<String, Result<f64, u16>>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(outcomes: &[(&str, Result<f64, u16>)]) -> Self {
            Self {
                outcomes: outcomes
                    .iter()
                    .map(|(id, o)| (id.to_string(), *o))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        type Raw = CurrentConditionsResponse;

        async fn fetch(&self, location: &LocationConfig) -> Result<CurrentConditionsResponse, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcomes.get(&location.id) {
                Some(Ok(pressure)) => Ok(serde_json::from_value(json!({
                    "airPressure": { "meanSeaLevelMillibars": pressure },
                    "relativeHumidity": 55
                }))?),
                Some(Err(status)) => Err(google_client::classify_status(*status, "boom".into())),
                None => Err(Error::Network("unreachable".into())),
            }
        }
    }

    /// Rejects every archive append.
    struct BrokenArchive {
        inner: MemoryStore,
    }

    #[async_trait]
    impl DocumentStore for BrokenArchive {
        async fn get(&self, collection: &str, key: &str) -> Result<Option<Versioned>, Error> {
            self.inner.get(collection, key).await
        }

        async fn put(
            &self,
            collection: &str,
            key: &str,
            data: Value,
            precondition: Precondition,
        ) -> Result<u64, Error> {
            self.inner.put(collection, key, data, precondition).await
        }

        async fn append(&self, _collection: &str, _data: Value) -> Result<String, Error> {
            Err(Error::Store("archive unavailable".into()))
        }
    }

    fn locations(ids: &[&str]) -> Vec<LocationConfig> {
        ids.iter()
            .map(|id| LocationConfig::new(*id, 30.0, -97.0))
            .collect()
    }

    fn weather_run(
        fetcher: FakeFetcher,
        store: Arc<dyn DocumentStore>,
        ids: &[&str],
    ) -> CollectionRun<FakeFetcher> {
        let merger = CacheMerger::new(
            store.clone(),
            "weather_cache",
            48,
            5,
            PressureAnalyzer::default(),
        );
        CollectionRun::new(fetcher, store, merger, "weather_raw", locations(ids))
    }

    #[tokio::test]
    async fn test_all_locations_written() {
        let store = MemoryStore::new();
        let fetcher = FakeFetcher::new(&[("a", Ok(1013.0)), ("b", Ok(1009.5))]);
        let run = weather_run(fetcher, Arc::new(store.clone()), &["a", "b"]);

        let report = run.run().await;

        assert!(report.is_success());
        assert_eq!(report.succeeded, vec!["a", "b"]);
        assert!(report.failed.is_empty());
        assert_eq!(store.archived("weather_raw").len(), 2);
        assert_eq!(store.len("weather_cache"), 2);

        let doc = store.get("weather_cache", "b").await.unwrap().unwrap();
        let record: WeatherCacheRecord = serde_json::from_value(doc.data).unwrap();
        assert_eq!(record.current.pressure_mb, 1009.5);
        assert_eq!(record.current.humidity_pct, Some(55));
        assert_eq!(record.history.len(), 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let store = MemoryStore::new();
        let fetcher = FakeFetcher::new(&[("a", Err(403)), ("b", Ok(0.0)), ("c", Ok(1000.0))]);
        let run = weather_run(fetcher, Arc::new(store.clone()), &["a", "b", "c"]);

        let report = run.run().await;

        assert!(report.is_success());
        assert_eq!(report.succeeded, vec!["c"]);
        assert_eq!(report.failed.len(), 2);

        assert_eq!(report.failed[0].location, "a");
        assert_eq!(report.failed[0].stage, Stage::Fetch);
        assert!(matches!(report.failed[0].error, Error::ApiTerminal { status: 403, .. }));

        // Zero pressure is rejected during mapping and never persisted.
        assert_eq!(report.failed[1].location, "b");
        assert_eq!(report.failed[1].stage, Stage::Map);
        assert!(store.get("weather_cache", "b").await.unwrap().is_none());

        assert_eq!(store.archived("weather_raw").len(), 1);
    }

    #[tokio::test]
    async fn test_all_failing_is_not_success() {
        let store = MemoryStore::new();
        let fetcher = FakeFetcher::new(&[("a", Err(500))]);
        let run = weather_run(fetcher, Arc::new(store.clone()), &["a", "missing"]);

        let report = run.run().await;

        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_archive_failure_skips_merge() {
        let inner = MemoryStore::new();
        let store = Arc::new(BrokenArchive { inner: inner.clone() });
        let fetcher = FakeFetcher::new(&[("a", Ok(1013.0))]);
        let run = weather_run(fetcher, store, &["a"]);

        let report = run.run().await;

        assert!(!report.is_success());
        assert_eq!(report.failed[0].stage, Stage::Archive);
        assert!(inner.get("weather_cache", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_run_keeps_location_order() {
        let store = MemoryStore::new();
        let ids = ["a", "b", "c", "d", "e"];
        let outcomes: Vec<(&str, Result<f64, u16>)> =
            ids.iter().map(|id| (*id, Ok(1010.0))).collect();
        let run = weather_run(FakeFetcher::new(&outcomes), Arc::new(store.clone()), &ids)
            .with_concurrency(3);

        let report = run.run().await;

        assert_eq!(report.succeeded, ids.to_vec());
        assert_eq!(run.fetcher.calls.load(Ordering::SeqCst), 5);
        assert_eq!(store.len("weather_cache"), 5);
    }
}
