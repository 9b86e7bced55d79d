//! Collector configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Google Maps Platform API key. Sent as a header, never logged.
    #[serde(default, skip_serializing)]
    pub api_key: String,

    /// Locations to monitor.
    #[serde(default = "default_locations")]
    pub locations: Vec<LocationConfig>,

    /// Current-conditions (pressure) family settings.
    #[serde(default = "FamilyConfig::weather")]
    pub weather: FamilyConfig,

    /// Pollen forecast family settings.
    #[serde(default = "FamilyConfig::pollen")]
    pub pollen: FamilyConfig,

    /// Outbound request retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Delta / trend thresholds.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Document store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Max locations fetched at once. 1 keeps the run serial.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// A monitored geographic point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Stable identifier; doubles as the cache document key.
    pub id: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl LocationConfig {
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lon,
        }
    }

    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Per metric family endpoint and persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyConfig {
    /// API base, e.g. `https://weather.googleapis.com/v1`.
    pub base_url: String,
    /// Collection holding one cache record per location.
    pub cache_collection: String,
    /// Append-only archive of full snapshots.
    pub raw_collection: String,
    /// Max history points retained per location.
    pub history_cap: usize,
}

impl FamilyConfig {
    pub fn weather() -> Self {
        Self {
            base_url: "https://weather.googleapis.com/v1".into(),
            cache_collection: "weather_cache".into(),
            raw_collection: "weather_raw".into(),
            history_cap: 48,
        }
    }

    /// 14 days at two readings per day.
    pub fn pollen() -> Self {
        Self {
            base_url: "https://pollen.googleapis.com/v1".into(),
            cache_collection: "pollen_cache".into(),
            raw_collection: "pollen_raw".into(),
            history_cap: 28,
        }
    }
}

/// Retry schedule for a single location's fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before each retry, in milliseconds. Attempts = len + 1.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl RetryConfig {
    pub fn backoffs(&self) -> Vec<Duration> {
        self.backoff_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Pressure analytics thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Max distance between a horizon's target time and a matched point.
    #[serde(default = "default_delta_tolerance")]
    pub delta_tolerance_mins: i64,

    /// |3h delta| above this is rising/falling, in millibars.
    #[serde(default = "default_trend_threshold")]
    pub trend_threshold_mb: f64,
}

/// Store location and transaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for the file-backed store.
    #[serde(default = "default_store_dir")]
    pub dir: String,

    /// Read-modify-write attempts before a conflict is surfaced.
    #[serde(default = "default_transaction_attempts")]
    pub transaction_attempts: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_concurrency() -> usize {
    1
}

fn default_backoff_ms() -> Vec<u64> {
    vec![1000, 2000, 4000]
}
fn default_request_timeout() -> u64 {
    15
}

fn default_delta_tolerance() -> i64 {
    45
}
fn default_trend_threshold() -> f64 {
    0.5
}

fn default_store_dir() -> String {
    "data".into()
}
fn default_transaction_attempts() -> u32 {
    5
}

fn default_locations() -> Vec<LocationConfig> {
    vec![
        LocationConfig::new("house-nick", 30.260543381977474, -97.66768538740229),
        LocationConfig::new("house-nita", 30.29420179895202, -97.6958691874014),
        LocationConfig::new("distribution-hall", 30.261932944618565, -97.72816923158192),
    ]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_ms: default_backoff_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            delta_tolerance_mins: default_delta_tolerance(),
            trend_threshold_mb: default_trend_threshold(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            transaction_attempts: default_transaction_attempts(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            locations: default_locations(),
            weather: FamilyConfig::weather(),
            pollen: FamilyConfig::pollen(),
            retry: RetryConfig::default(),
            analytics: AnalyticsConfig::default(),
            store: StoreConfig::default(),
            concurrency: default_concurrency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locations_are_valid_and_distinct() {
        let cfg = CollectorConfig::default();
        assert_eq!(cfg.locations.len(), 3);
        assert!(cfg.locations.iter().all(|l| l.has_valid_coordinates()));

        let mut ids: Vec<&str> = cfg.locations.iter().map(|l| l.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_family_defaults() {
        let cfg = CollectorConfig::default();
        assert_eq!(cfg.weather.history_cap, 48);
        assert_eq!(cfg.pollen.history_cap, 28);
        assert_eq!(cfg.weather.cache_collection, "weather_cache");
        assert_eq!(cfg.pollen.cache_collection, "pollen_cache");
        assert_ne!(cfg.weather.raw_collection, cfg.pollen.raw_collection);
    }

    #[test]
    fn test_retry_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(
            retry.backoffs(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(retry.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: CollectorConfig = toml::from_str(
            r#"
            concurrency = 2

            [[locations]]
            id = "office"
            lat = 47.6
            lon = -122.3

            [analytics]
            trend_threshold_mb = 1.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.locations, vec![LocationConfig::new("office", 47.6, -122.3)]);
        assert_eq!(cfg.analytics.delta_tolerance_mins, 45);
        assert!((cfg.analytics.trend_threshold_mb - 1.0).abs() < f64::EPSILON);
        assert_eq!(cfg.weather.history_cap, 48);
        assert!(cfg.api_key.is_empty());
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(LocationConfig::new("a", 90.0, 180.0).has_valid_coordinates());
        assert!(!LocationConfig::new("b", 90.1, 0.0).has_valid_coordinates());
        assert!(!LocationConfig::new("c", 0.0, -180.5).has_valid_coordinates());
    }
}
