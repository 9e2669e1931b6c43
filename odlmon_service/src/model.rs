/// Core data types for the ODL dose-rate monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// the measurement produced by a fetch, the per-run station query, and the
/// error types that describe why a fetch came back empty.

use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Seconds to wait for a measurement per attempt.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Minutes between fetch attempts.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// Unit reported by the station page. The page shows only the number.
pub const DOSE_RATE_UNIT: &str = "µSv/h";

/// Format of the local wall-clock column written to every CSV row.
pub const RETRIEVED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// One dose-rate reading for a station, as returned by a successful fetch.
///
/// `value` is kept as the decimal text the source delivered; it is written
/// to the CSV verbatim and never parsed into a float.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub name: Option<String>,      // station label, WFS only
    pub value: String,             // e.g. "0.082"
    pub unit: String,              // e.g. "µSv/h"
    pub timestamp: Option<String>, // source end_measure, e.g. "2024-01-01T12:00:00Z"
    pub retrieved_at: NaiveDateTime,
}

impl Measurement {
    /// Local wall-clock retrieval time in the CSV format.
    pub fn retrieved_at_str(&self) -> String {
        self.retrieved_at.format(RETRIEVED_AT_FORMAT).to_string()
    }

    /// Human-readable one-liner for the console.
    pub fn summary(&self) -> String {
        let mut line = String::new();
        if let Some(name) = &self.name {
            line.push_str(name);
            line.push(' ');
        }
        line.push_str(&self.value);
        line.push(' ');
        line.push_str(&self.unit);
        if let Some(ts) = &self.timestamp {
            line.push_str(&format!(" (last measurement: {})", ts));
        }
        line
    }
}

// ---------------------------------------------------------------------------
// Station query
// ---------------------------------------------------------------------------

/// Per-run configuration. Built once at startup, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationQuery {
    pub station_id: String,
    pub timeout_seconds: u64,
    pub interval_minutes: u64,
    pub debug: bool,
    pub once: bool,
}

impl StationQuery {
    /// Validates the inputs and builds a query.
    ///
    /// This is the only place usage errors surface; once a query exists the
    /// polling loop never fails on account of its configuration.
    pub fn new(
        station_id: &str,
        timeout_seconds: u64,
        interval_minutes: u64,
        debug: bool,
        once: bool,
    ) -> Result<Self, QueryError> {
        crate::stations::validate_station_id(station_id)?;
        if timeout_seconds == 0 {
            return Err(QueryError::ZeroTimeout);
        }
        if interval_minutes == 0 {
            return Err(QueryError::ZeroInterval);
        }
        if interval_minutes.checked_mul(60).is_none() {
            return Err(QueryError::IntervalTooLong(interval_minutes));
        }

        Ok(Self {
            station_id: station_id.trim().to_string(),
            timeout_seconds,
            interval_minutes,
            debug,
            once,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn interval(&self) -> Duration {
        // checked in `new`; saturates if the public field was changed since
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Usage errors detected while building a [`StationQuery`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("station id must not be empty")]
    EmptyStationId,
    #[error("station id '{0}' may only contain ASCII letters and digits")]
    InvalidStationId(String),
    #[error("timeout must be greater than zero seconds")]
    ZeroTimeout,
    #[error("interval must be greater than zero minutes")]
    ZeroInterval,
    #[error("interval of {0} minutes is too long")]
    IntervalTooLong(u64),
}

/// Reasons a fetch produced no measurement.
///
/// None of these are fatal: the poller treats every variant as an empty
/// cycle and tries again at the next interval.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, TLS or body read failure.
    #[error("Transport error: {0}")]
    Transport(String),
    /// No response (or no value on the page) within the fetch timeout.
    #[error("timeout after {0}s")]
    Timeout(u64),
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    /// The body was not the JSON shape we expect, or a field was missing.
    #[error("Parse error: {0}")]
    Malformed(String),
    /// Valid response that carried zero features for the station.
    #[error("No data: response contained no features")]
    NoFeatures,
    /// The dose-rate element was absent or empty on the station page.
    #[error("No data: dose-rate element missing or empty")]
    ElementMissing,
}

impl FetchError {
    /// Maps a reqwest failure onto the fetch taxonomy. `timeout_secs` is the
    /// bound that was configured on the request.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout_secs)
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus(status.as_u16())
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Failure to persist a measurement.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write row to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("cannot flush {path}: {source}")]
    Flush {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> Measurement {
        Measurement {
            name: Some("Musterstadt".to_string()),
            value: "0.082".to_string(),
            unit: DOSE_RATE_UNIT.to_string(),
            timestamp: Some("2024-01-01T12:00:00Z".to_string()),
            retrieved_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(13, 5, 9)
                .unwrap(),
        }
    }

    #[test]
    fn test_retrieved_at_uses_csv_format() {
        assert_eq!(sample().retrieved_at_str(), "2024-01-01 13:05:09");
    }

    #[test]
    fn test_summary_includes_name_and_source_timestamp() {
        assert_eq!(
            sample().summary(),
            "Musterstadt 0.082 µSv/h (last measurement: 2024-01-01T12:00:00Z)"
        );
    }

    #[test]
    fn test_summary_without_optional_fields() {
        let m = Measurement {
            name: None,
            timestamp: None,
            ..sample()
        };
        assert_eq!(m.summary(), "0.082 µSv/h");
    }

    #[test]
    fn test_query_rejects_zero_timeout_and_interval() {
        assert_eq!(
            StationQuery::new("031520061", 0, 5, false, false),
            Err(QueryError::ZeroTimeout)
        );
        assert_eq!(
            StationQuery::new("031520061", 30, 0, false, false),
            Err(QueryError::ZeroInterval)
        );
    }

    #[test]
    fn test_query_rejects_empty_station_id() {
        assert_eq!(
            StationQuery::new("   ", 30, 5, false, false),
            Err(QueryError::EmptyStationId)
        );
    }

    #[test]
    fn test_query_rejects_interval_overflowing_seconds() {
        assert_eq!(
            StationQuery::new("031520061", 30, 307445734561825861, false, false),
            Err(QueryError::IntervalTooLong(307445734561825861))
        );
        assert_eq!(
            StationQuery::new("031520061", 30, u64::MAX, false, false),
            Err(QueryError::IntervalTooLong(u64::MAX))
        );
    }

    #[test]
    fn test_query_accepts_longest_interval() {
        let longest = u64::MAX / 60;
        let q = StationQuery::new("031520061", 30, longest, false, false).unwrap();
        assert_eq!(q.interval(), Duration::from_secs(longest * 60));
    }

    #[test]
    fn test_query_durations() {
        let q = StationQuery::new("031520061", 30, 5, false, true).unwrap();
        assert_eq!(q.timeout(), Duration::from_secs(30));
        assert_eq!(q.interval(), Duration::from_secs(300));
        assert!(q.once);
    }
}
