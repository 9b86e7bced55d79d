//! Per-family behavior the merge and run steps need from a snapshot.

use chrono::{DateTime, Utc};
use common::{PollenSnapshot, PressureAnalysis, PressurePoint, WeatherSnapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::analytics::PressureAnalyzer;
use crate::history::{HistoryWindow, Timestamped};

/// A canonical snapshot that can be archived and merged into a cache record.
pub trait Reading: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// What goes into the rolling history.
    type Point: Timestamped + Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Short family name used in logs.
    const FAMILY: &'static str;

    fn location_id(&self) -> &str;

    fn collected_at(&self) -> DateTime<Utc>;

    fn to_point(&self) -> Self::Point;

    /// Analytics over the already-updated history, if the family has any.
    fn analyze(
        &self,
        analyzer: &PressureAnalyzer,
        history: &HistoryWindow<Self::Point>,
    ) -> Option<PressureAnalysis>;
}

impl Reading for WeatherSnapshot {
    type Point = PressurePoint;

    const FAMILY: &'static str = "weather";

    fn location_id(&self) -> &str {
        &self.location
    }

    fn collected_at(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn to_point(&self) -> PressurePoint {
        PressurePoint::from(self)
    }

    fn analyze(
        &self,
        analyzer: &PressureAnalyzer,
        history: &HistoryWindow<PressurePoint>,
    ) -> Option<PressureAnalysis> {
        Some(analyzer.analyze(&self.location, history.points()))
    }
}

impl Reading for PollenSnapshot {
    type Point = PollenSnapshot;

    const FAMILY: &'static str = "pollen";

    fn location_id(&self) -> &str {
        &self.location_id
    }

    fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    fn to_point(&self) -> PollenSnapshot {
        self.clone()
    }

    fn analyze(
        &self,
        _analyzer: &PressureAnalyzer,
        _history: &HistoryWindow<PollenSnapshot>,
    ) -> Option<PressureAnalysis> {
        None
    }
}
