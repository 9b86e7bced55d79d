//! Current conditions (`currentConditions:lookup`) fetcher and mapping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::LocationConfig;
use common::{Error, WeatherSnapshot};
use serde::Deserialize;
use tracing::debug;

use crate::{location_query, Fetcher, GoogleApiClient, IntoSnapshot};

/// Response from `currentConditions:lookup`, consumed only as deep as needed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditionsResponse {
    #[serde(default)]
    pub temperature: Option<Degrees>,
    #[serde(default)]
    pub feels_like_temperature: Option<Degrees>,
    #[serde(default)]
    pub relative_humidity: Option<i64>,
    #[serde(default)]
    pub uv_index: Option<i64>,
    #[serde(default)]
    pub air_pressure: Option<AirPressure>,
    #[serde(default)]
    pub wind: Option<Wind>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub dew_point: Option<Degrees>,
    #[serde(default)]
    pub precipitation: Option<Precipitation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Degrees {
    #[serde(default)]
    pub degrees: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirPressure {
    #[serde(default)]
    pub mean_sea_level_millibars: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wind {
    #[serde(default)]
    pub direction: Option<WindDirection>,
    #[serde(default)]
    pub speed: Option<WindValue>,
    #[serde(default)]
    pub gust: Option<WindValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindDirection {
    #[serde(default)]
    pub degrees: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindValue {
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Visibility {
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Precipitation {
    #[serde(default)]
    pub probability: Option<PrecipitationProbability>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrecipitationProbability {
    #[serde(default, alias = "probability")]
    pub percent: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

pub fn c_to_f(c: f64) -> f64 {
    c * 1.8 + 32.0
}

pub fn km_to_mi(km: f64) -> f64 {
    km * 0.621371
}

impl CurrentConditionsResponse {
    fn pressure_mb(&self) -> Option<f64> {
        self.air_pressure.as_ref()?.mean_sea_level_millibars
    }

    fn wind_speed_kph(&self) -> Option<f64> {
        self.wind.as_ref()?.speed.as_ref()?.value
    }

    fn wind_gust_kph(&self) -> Option<f64> {
        self.wind.as_ref()?.gust.as_ref()?.value
    }

    fn wind_dir_deg(&self) -> Option<i64> {
        self.wind.as_ref()?.direction.as_ref()?.degrees
    }

    fn precipitation_pct(&self) -> Option<i64> {
        self.precipitation.as_ref()?.probability.as_ref()?.percent
    }
}

fn degrees(value: &Option<Degrees>) -> Option<f64> {
    value.as_ref()?.degrees
}

impl IntoSnapshot for CurrentConditionsResponse {
    type Snapshot = WeatherSnapshot;

    /// Rejects a missing or non-positive pressure: a 0.0 reading means the
    /// payload was incomplete and would corrupt every delta computed from it.
    fn into_snapshot(
        self,
        location_id: &str,
        collected_at: DateTime<Utc>,
    ) -> Result<WeatherSnapshot, Error> {
        let pressure_mb = match self.pressure_mb() {
            Some(p) if p.is_finite() && p > 0.0 => p,
            Some(p) => {
                return Err(Error::Validation(format!(
                    "invalid pressure data ({p}) received for {location_id}"
                )))
            }
            None => {
                return Err(Error::Validation(format!(
                    "missing pressure data for {location_id}"
                )))
            }
        };

        let temp_c = degrees(&self.temperature);
        let temp_feel_c = degrees(&self.feels_like_temperature);
        let dewpoint_c = degrees(&self.dew_point);
        let wind_speed_kph = self.wind_speed_kph();
        let wind_gust_kph = self.wind_gust_kph();
        let visibility_km = self.visibility.as_ref().and_then(|v| v.distance);

        let wp = WeatherSnapshot {
            location: location_id.to_string(),
            timestamp: collected_at,
            pressure_mb,
            humidity_pct: self.relative_humidity,
            precipitation_pct: self.precipitation_pct(),
            uv_index: self.uv_index,
            wind_dir_deg: self.wind_dir_deg(),
            temp_c,
            temp_feel_c,
            dewpoint_c,
            wind_speed_kph,
            wind_gust_kph,
            visibility_km,
            temp_f: temp_c.map(c_to_f),
            temp_feel_f: temp_feel_c.map(c_to_f),
            dewpoint_f: dewpoint_c.map(c_to_f),
            wind_speed_mph: wind_speed_kph.map(km_to_mi),
            wind_gust_mph: wind_gust_kph.map(km_to_mi),
            visibility_mi: visibility_km.map(km_to_mi),
        };

        debug!(
            location = location_id,
            pressure_mb = wp.pressure_mb,
            temp_c = ?wp.temp_c,
            humidity_pct = ?wp.humidity_pct,
            wind_speed_kph = ?wp.wind_speed_kph,
            "mapped weather snapshot"
        );

        Ok(wp)
    }
}

/// Fetcher for the current-conditions endpoint.
#[derive(Debug, Clone)]
pub struct WeatherFetcher {
    api: GoogleApiClient,
    url: String,
}

impl WeatherFetcher {
    pub fn new(api: GoogleApiClient, base_url: &str) -> Self {
        Self {
            api,
            url: format!("{}/currentConditions:lookup", base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Fetcher for WeatherFetcher {
    type Raw = CurrentConditionsResponse;

    async fn fetch(&self, location: &LocationConfig) -> Result<CurrentConditionsResponse, Error> {
        self.api
            .get_json(&self.url, &location_query(location), &location.id)
            .await
    }
}
