//! Pollen forecast (`forecast:lookup`) fetcher and mapping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::LocationConfig;
use common::{Error, PollenSnapshot, StoredPollenPlant, StoredPollenType};
use serde::Deserialize;

use crate::{location_query, Fetcher, GoogleApiClient, IntoSnapshot};

/// Days of forecast requested; only today is stored.
const FORECAST_DAYS: u32 = 1;

/// Response from `forecast:lookup`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollenForecastResponse {
    #[serde(default)]
    pub daily_info: Vec<DailyInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyInfo {
    #[serde(default)]
    pub date: Option<ApiDate>,
    #[serde(default)]
    pub pollen_type_info: Vec<PollenInfo>,
    #[serde(default)]
    pub plant_info: Vec<PollenInfo>,
}

/// Zero-valued parts are omitted on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiDate {
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub month: u32,
    #[serde(default)]
    pub day: u32,
}

/// A pollen type (GRASS/TREE/WEED) or individual plant entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollenInfo {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub in_season: Option<bool>,
    #[serde(default)]
    pub index_info: Option<IndexInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexInfo {
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
}

impl PollenInfo {
    fn index(&self) -> Option<i64> {
        self.index_info.as_ref()?.value
    }

    fn category(&self) -> Option<String> {
        self.index_info.as_ref()?.category.clone()
    }
}

/// The pollen type with the highest index.
///
/// Only a strictly greater index replaces the current best, so the first
/// entry wins a tie and all-zero (or absent) indices yield no dominant type.
pub fn dominant_type(types: &[StoredPollenType]) -> Option<&StoredPollenType> {
    let mut best: Option<&StoredPollenType> = None;
    let mut best_index = 0;
    for t in types {
        let index = t.index.unwrap_or(0);
        if index > best_index {
            best_index = index;
            best = Some(t);
        }
    }
    best
}

impl IntoSnapshot for PollenForecastResponse {
    type Snapshot = PollenSnapshot;

    fn into_snapshot(
        self,
        location_id: &str,
        collected_at: DateTime<Utc>,
    ) -> Result<PollenSnapshot, Error> {
        let Some(today) = self.daily_info.into_iter().next() else {
            return Err(Error::Payload(format!("no daily info returned for {location_id}")));
        };

        let types: Vec<StoredPollenType> = today
            .pollen_type_info
            .iter()
            .map(|t| StoredPollenType {
                code: t.code.clone(),
                index: t.index(),
                category: t.category(),
                in_season: t.in_season.unwrap_or(false),
            })
            .collect();

        let plants = today
            .plant_info
            .iter()
            .map(|p| StoredPollenPlant {
                code: p.code.clone(),
                display_name: p.display_name.clone(),
                index: p.index(),
                category: p.category(),
                in_season: p.in_season.unwrap_or(false),
            })
            .collect();

        let (overall_index, overall_category, dominant) = match dominant_type(&types) {
            Some(t) => (t.index.unwrap_or(0), t.category.clone(), Some(t.code.clone())),
            None => (0, None, None),
        };

        Ok(PollenSnapshot {
            location_id: location_id.to_string(),
            collected_at,
            overall_index,
            overall_category,
            dominant_type: dominant,
            types,
            plants,
        })
    }
}

/// Fetcher for the pollen forecast endpoint.
#[derive(Debug, Clone)]
pub struct PollenFetcher {
    api: GoogleApiClient,
    url: String,
}

impl PollenFetcher {
    pub fn new(api: GoogleApiClient, base_url: &str) -> Self {
        Self {
            api,
            url: format!("{}/forecast:lookup", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl Fetcher for PollenFetcher {
    type Raw = PollenForecastResponse;

    async fn fetch(&self, location: &LocationConfig) -> Result<PollenForecastResponse, Error> {
        let mut query = location_query(location);
        query.push(("days", FORECAST_DAYS.to_string()));

        let data: PollenForecastResponse =
            self.api.get_json(&self.url, &query, &location.id).await?;

        // Decodable but empty: nothing a retry would change.
        if data.daily_info.is_empty() {
            return Err(Error::Payload(format!(
                "no daily info returned for {}",
                location.id
            )));
        }

        Ok(data)
    }
}
