//! Domain types shared across the collectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Look-back horizons (hours) for pressure deltas.
pub const DELTA_HORIZONS_HOURS: [i64; 5] = [1, 3, 6, 12, 24];

// ── Weather (pressure) ────────────────────────────────────────────────

/// One validated current-conditions reading for a location.
///
/// Only pressure is guaranteed; every other quantity is `None` when the
/// API left it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub pressure_mb: f64,

    #[serde(default)]
    pub humidity_pct: Option<i64>,
    #[serde(default)]
    pub precipitation_pct: Option<i64>,
    #[serde(default)]
    pub uv_index: Option<i64>,
    #[serde(default)]
    pub wind_dir_deg: Option<i64>,

    #[serde(default)]
    pub temp_c: Option<f64>,
    #[serde(default)]
    pub temp_feel_c: Option<f64>,
    #[serde(default)]
    pub dewpoint_c: Option<f64>,
    #[serde(default)]
    pub wind_speed_kph: Option<f64>,
    #[serde(default)]
    pub wind_gust_kph: Option<f64>,
    #[serde(default)]
    pub visibility_km: Option<f64>,

    #[serde(default)]
    pub temp_f: Option<f64>,
    #[serde(default)]
    pub temp_feel_f: Option<f64>,
    #[serde(default)]
    pub dewpoint_f: Option<f64>,
    #[serde(default)]
    pub wind_speed_mph: Option<f64>,
    #[serde(default)]
    pub wind_gust_mph: Option<f64>,
    #[serde(default, rename = "visibility_miles")]
    pub visibility_mi: Option<f64>,
}

/// The slice of a `WeatherSnapshot` kept in the rolling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressurePoint {
    pub timestamp: DateTime<Utc>,
    pub pressure_mb: f64,

    #[serde(default)]
    pub humidity_pct: Option<i64>,
    #[serde(default)]
    pub temp_c: Option<f64>,
    #[serde(default)]
    pub temp_feel_c: Option<f64>,
    #[serde(default)]
    pub dewpoint_c: Option<f64>,
    #[serde(default)]
    pub temp_f: Option<f64>,
    #[serde(default)]
    pub temp_feel_f: Option<f64>,
    #[serde(default)]
    pub dewpoint_f: Option<f64>,
}

impl PressurePoint {
    /// A bare point carrying only what delta math needs.
    pub fn new(timestamp: DateTime<Utc>, pressure_mb: f64) -> Self {
        Self {
            timestamp,
            pressure_mb,
            humidity_pct: None,
            temp_c: None,
            temp_feel_c: None,
            dewpoint_c: None,
            temp_f: None,
            temp_feel_f: None,
            dewpoint_f: None,
        }
    }
}

impl From<&WeatherSnapshot> for PressurePoint {
    fn from(wp: &WeatherSnapshot) -> Self {
        Self {
            timestamp: wp.timestamp,
            pressure_mb: wp.pressure_mb,
            humidity_pct: wp.humidity_pct,
            temp_c: wp.temp_c,
            temp_feel_c: wp.temp_feel_c,
            dewpoint_c: wp.dewpoint_c,
            temp_f: wp.temp_f,
            temp_feel_f: wp.temp_feel_f,
            dewpoint_f: wp.dewpoint_f,
        }
    }
}

/// Barometric tendency label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
    #[default]
    Unknown,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Stable => "stable",
            Trend::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived pressure statistics.
///
/// Deltas are `None` when no stored point lies close enough to the horizon,
/// which is distinct from a measured change of 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PressureAnalysis {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "delta_01h")]
    pub delta_1h: Option<f64>,
    #[serde(rename = "delta_03h")]
    pub delta_3h: Option<f64>,
    #[serde(rename = "delta_06h")]
    pub delta_6h: Option<f64>,
    #[serde(rename = "delta_12h")]
    pub delta_12h: Option<f64>,
    #[serde(rename = "delta_24h")]
    pub delta_24h: Option<f64>,
    pub trend: Trend,
}

impl PressureAnalysis {
    /// Delta for one of `DELTA_HORIZONS_HOURS`.
    pub fn delta(&self, hours: i64) -> Option<f64> {
        match hours {
            1 => self.delta_1h,
            3 => self.delta_3h,
            6 => self.delta_6h,
            12 => self.delta_12h,
            24 => self.delta_24h,
            _ => None,
        }
    }

    pub fn set_delta(&mut self, hours: i64, value: Option<f64>) {
        match hours {
            1 => self.delta_1h = value,
            3 => self.delta_3h = value,
            6 => self.delta_6h = value,
            12 => self.delta_12h = value,
            24 => self.delta_24h = value,
            _ => {}
        }
    }
}

// ── Pollen ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPollenType {
    pub code: String,
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub in_season: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPollenPlant {
    pub code: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub in_season: bool,
}

/// One day's pollen reading for a location, with the dominant type resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollenSnapshot {
    pub location_id: String,
    pub collected_at: DateTime<Utc>,
    pub overall_index: i64,
    #[serde(default)]
    pub overall_category: Option<String>,
    #[serde(default)]
    pub dominant_type: Option<String>,
    #[serde(default)]
    pub types: Vec<StoredPollenType>,
    #[serde(default)]
    pub plants: Vec<StoredPollenPlant>,
}

// ── Cache record ──────────────────────────────────────────────────────

/// The persisted "latest state" document for one location.
///
/// `S` is the snapshot type, `P` the history projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "S: Deserialize<'de>, P: Deserialize<'de>"))]
pub struct CacheRecord<S, P> {
    pub last_updated: DateTime<Utc>,
    pub current: S,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PressureAnalysis>,
    #[serde(default)]
    pub history: Vec<P>,
}

pub type WeatherCacheRecord = CacheRecord<WeatherSnapshot, PressurePoint>;
pub type PollenCacheRecord = CacheRecord<PollenSnapshot, PollenSnapshot>;
