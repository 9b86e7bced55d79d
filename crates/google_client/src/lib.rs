//! Google Maps Platform environment API clients.
//!
//! Fetches current conditions (pressure) and pollen forecasts for a location,
//! classifies failures as retryable or terminal, and maps raw payloads into
//! the shared snapshot types.

pub mod pollen;
pub mod retry;
pub mod weather;

pub use pollen::{PollenFetcher, PollenForecastResponse};
pub use retry::{RetryPolicy, RetryingFetcher};
pub use weather::{CurrentConditionsResponse, WeatherFetcher};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::LocationConfig;
use common::Error;
use reqwest::header::HeaderValue;
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::debug;

/// Header carrying the API key. The key never goes into the URL.
pub const API_KEY_HEADER: &str = "X-Goog-Api-Key";

const USER_AGENT: &str = "env-collector/0.1";

const REDACTED: &str = "[REDACTED]";

/// One outbound reading for one location.
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Raw: Send;

    async fn fetch(&self, location: &LocationConfig) -> Result<Self::Raw, Error>;
}

/// Conversion of a raw API payload into a canonical snapshot.
pub trait IntoSnapshot {
    type Snapshot;

    fn into_snapshot(
        self,
        location_id: &str,
        collected_at: DateTime<Utc>,
    ) -> Result<Self::Snapshot, Error>;
}

/// Map a non-success status to an error kind.
///
/// 429 and 5xx may clear up on their own; every other status means the
/// request itself is wrong.
pub fn classify_status(status: u16, message: String) -> Error {
    if status == 429 || status >= 500 {
        Error::ApiRetryable { status, message }
    } else {
        Error::ApiTerminal { status, message }
    }
}

fn format_reqwest_error(err: reqwest::Error) -> String {
    // Keep chained causes so DNS/TLS/socket failures are visible.
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

fn summarize_response_body(raw: &str) -> String {
    const MAX_CHARS: usize = 500;
    let compact = raw.replace(['\n', '\r'], " ");
    match compact.char_indices().nth(MAX_CHARS) {
        Some((cut, _)) => format!("{}…", &compact[..cut]),
        None => compact,
    }
}

/// Shared HTTP plumbing for the Google environment APIs.
#[derive(Debug, Clone)]
pub struct GoogleApiClient {
    client: reqwest::Client,
    api_key: HeaderValue,
}

impl GoogleApiClient {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, Error> {
        let mut api_key = HeaderValue::from_str(api_key)
            .map_err(|_| Error::Config("API key contains invalid header characters".into()))?;
        api_key.set_sensitive(true);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_key })
    }

    pub(crate) fn request(&self, url: &str, query: &[(&str, String)]) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header(API_KEY_HEADER, self.api_key.clone())
            .query(query)
    }

    /// Replace any occurrence of the key, e.g. a server echoing request
    /// headers back in an error body.
    fn redact(&self, text: &str) -> String {
        match self.api_key.to_str() {
            Ok(key) if !key.is_empty() => text.replace(key, REDACTED),
            _ => text.to_string(),
        }
    }

    /// Issue one GET and decode the body, classifying every failure.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        location_id: &str,
    ) -> Result<T, Error> {
        debug!("GET {} for {}", url, location_id);

        let resp = self.request(url, query).send().await.map_err(|e| {
            Error::Network(self.redact(&format!("{location_id}: {}", format_reqwest_error(e))))
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    let reason = self.redact(&format_reqwest_error(e));
                    debug!(
                        location = location_id,
                        status = status.as_u16(),
                        error = %reason,
                        "failed to read error body"
                    );
                    format!("<body unavailable: {reason}>")
                }
            };
            let excerpt = summarize_response_body(&self.redact(&body));
            return Err(classify_status(
                status.as_u16(),
                format!("{location_id}: {excerpt}"),
            ));
        }

        resp.json::<T>().await.map_err(|e| {
            let is_decode = e.is_decode();
            let reason = self.redact(&format_reqwest_error(e));
            if is_decode {
                Error::Payload(format!("failed to decode response for {location_id}: {reason}"))
            } else {
                Error::Network(format!("{location_id}: {reason}"))
            }
        })
    }
}

pub(crate) fn location_query(location: &LocationConfig) -> Vec<(&'static str, String)> {
    vec![
        ("location.latitude", format!("{:.6}", location.lat)),
        ("location.longitude", format!("{:.6}", location.lon)),
    ]
}
