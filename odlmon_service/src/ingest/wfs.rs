/// BfS OGC/WFS JSON API client
///
/// Retrieves the most recent hourly ambient dose rate for a station from the
/// Federal Office for Radiation Protection's open data web service. The
/// layer `opendata:odlinfo_timeseries_odl_1h` is filtered to one station via
/// `viewparams=kenn:<id>`, sorted newest first and capped at one feature.
///
/// Endpoint: https://www.imis.bfs.de/ogc/opendata/ows

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use tracing::debug;

use super::{FetchOutcome, Fetcher};
use crate::logging::DataSource;
use crate::model::{FetchError, Measurement};

const WFS_LAYER: &str = "opendata:odlinfo_timeseries_odl_1h";

// ============================================================================
// WFS Response Structures
// ============================================================================

/// GeoJSON feature collection returned by `GetFeature`
#[derive(Debug, Deserialize)]
pub struct WfsFeatureCollection {
    pub features: Vec<WfsFeature>,
}

#[derive(Debug, Deserialize)]
pub struct WfsFeature {
    pub properties: WfsProperties,
}

/// The subset of feature properties we record.
#[derive(Debug, Deserialize)]
pub struct WfsProperties {
    pub name: String,
    pub value: Option<serde_json::Value>, // number in practice, null while pending
    pub unit: String,
    pub end_measure: String, // ISO 8601, e.g. "2024-01-01T12:00:00Z"
}

// ============================================================================
// URL Construction
// ============================================================================

/// Build the `GetFeature` URL for the newest hourly value of one station.
pub fn build_wfs_url(base_url: &str, station_id: &str) -> String {
    format!(
        "{}?service=WFS&version=1.1.0&request=GetFeature&typeName={}\
         &outputFormat=application/json&viewparams=kenn:{}\
         &sortBy=end_measure+D&maxFeatures=1",
        base_url, WFS_LAYER, station_id
    )
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a `GetFeature` response body into a measurement.
///
/// Only the first feature is used. `retrieved_at` is stamped onto the result
/// by the caller so parsing stays deterministic.
pub fn parse_wfs_response(
    body: &str,
    retrieved_at: NaiveDateTime,
) -> Result<Measurement, FetchError> {
    let collection: WfsFeatureCollection =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let props = collection
        .features
        .into_iter()
        .next()
        .ok_or(FetchError::NoFeatures)?
        .properties;

    Ok(Measurement {
        name: Some(props.name),
        value: value_text(props.value)?,
        unit: props.unit,
        timestamp: Some(props.end_measure),
        retrieved_at,
    })
}

/// Renders a feature's `value` as recorded text. Numbers keep their JSON
/// text (`0.082`), strings are trimmed, anything else is malformed.
pub(crate) fn value_text(value: Option<serde_json::Value>) -> Result<String, FetchError> {
    match value {
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(other) => Err(FetchError::Malformed(format!("unexpected value: {}", other))),
        None => Err(FetchError::Malformed("value is null".to_string())),
    }
}

// ============================================================================
// Fetcher
// ============================================================================

pub struct WfsFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl WfsFetcher {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// One GET, no retry. The request timeout covers connect, headers and body.
    pub async fn fetch_latest(
        &self,
        station_id: &str,
        timeout: Duration,
    ) -> Result<Measurement, FetchError> {
        let secs = timeout.as_secs();
        let url = build_wfs_url(&self.base_url, station_id);
        debug!(source = %DataSource::Wfs, station = station_id, "request: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, secs))?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, secs))?;

        parse_wfs_response(&body, Local::now().naive_local())
    }
}

#[async_trait]
impl Fetcher for WfsFetcher {
    fn source(&self) -> DataSource {
        DataSource::Wfs
    }

    async fn fetch(&self, station_id: &str, timeout: Duration) -> FetchOutcome {
        self.fetch_latest(station_id, timeout).await.into()
    }
}

// ============================================================================
// Tests
// ============================================================================
