/// Measurement sources.
///
/// Submodules:
/// - `wfs`  — BfS OGC/WFS JSON API (latest hourly value, with name and unit)
/// - `page` — BfS station web page (current value only)
///
/// Both implement [`Fetcher`]. A fetch never fails past this boundary: every
/// error is folded into [`FetchOutcome::Empty`] so the poller can treat it as
/// an empty cycle.

pub mod page;
pub mod wfs;

use std::time::Duration;

use async_trait::async_trait;

use crate::logging::DataSource;
use crate::model::{FetchError, Measurement};

/// Result of one fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(Measurement),
    Empty(FetchError),
}

impl FetchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, FetchOutcome::Found(_))
    }
}

impl From<Result<Measurement, FetchError>> for FetchOutcome {
    fn from(result: Result<Measurement, FetchError>) -> Self {
        match result {
            Ok(m) => FetchOutcome::Found(m),
            Err(e) => FetchOutcome::Empty(e),
        }
    }
}

/// A source of dose-rate measurements for a single station.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Which upstream this fetcher talks to, for log tagging.
    fn source(&self) -> DataSource;

    /// Obtain the current measurement for `station_id`, waiting at most
    /// `timeout`.
    async fn fetch(&self, station_id: &str, timeout: Duration) -> FetchOutcome;
}

/// Builds the HTTP client shared by both sources.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().user_agent(user_agent).build()
}
