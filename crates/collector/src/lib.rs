//! Ingestion-and-analytics engine.
//!
//! Maintains the bounded per-location history, derives pressure deltas and
//! trend from it, merges each new snapshot into its cache record inside an
//! optimistic transaction, and drives one collection pass over all locations.

pub mod analytics;
pub mod history;
pub mod merge;
pub mod reading;
pub mod run;

pub use analytics::{HorizonAudit, PressureAnalyzer};
pub use history::{HistoryWindow, Timestamped};
pub use merge::CacheMerger;
pub use reading::Reading;
pub use run::{CollectionRun, LocationFailure, RunReport, Stage};
