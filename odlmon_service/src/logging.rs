/// Structured logging for the dose-rate polling service
///
/// Installs the `tracing` subscriber used by the binary and provides
/// context-rich helpers that tag every event with its data source and
/// station id. Supports console output plus an optional append-only log file
/// for long unattended runs.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use crate::model::FetchError;

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// OGC/WFS JSON endpoint
    Wfs,
    /// Station web page
    Page,
    /// CSV recorder
    Csv,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Wfs => write!(f, "WFS"),
            DataSource::Page => write!(f, "PAGE"),
            DataSource::Csv => write!(f, "CSV"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Expected failure - the upstream simply has nothing for this station yet
    Expected,
    /// Unexpected failure - indicates network trouble or an upstream format change
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Expected => write!(f, "EXPECTED"),
            FailureKind::Unexpected => write!(f, "UNEXPECTED"),
            FailureKind::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a fetch failure.
///
/// An empty feature list is what the WFS returns for an unknown or
/// decommissioned station. Timeouts and a missing page element are usually a
/// slow upstream, but can also mean the page layout changed. Everything else
/// points at the network or a changed response format.
pub fn classify_fetch_failure(err: &FetchError) -> FailureKind {
    match err {
        FetchError::NoFeatures => FailureKind::Expected,
        FetchError::HttpStatus(404) => FailureKind::Expected,
        FetchError::Timeout(_) | FetchError::ElementMissing => FailureKind::Unknown,
        FetchError::HttpStatus(_) | FetchError::Transport(_) | FetchError::Malformed(_) => {
            FailureKind::Unexpected
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriber Setup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("logging already initialised: {0}")]
    AlreadyInitialised(#[from] tracing_subscriber::util::TryInitError),
}

/// Default filter directive. HTTP client internals stay quiet even in debug
/// mode unless `RUST_LOG` asks for them.
pub fn default_directive(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    format!("{level},hyper=warn,reqwest=warn,rustls=warn")
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over the `debug` flag. When `log_file` is
/// set, every event is also appended there without ANSI colours.
pub fn init_logging(debug: bool, log_file: Option<&str>) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let console = tfmt::layer().with_target(false).compact();

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::LogFile {
                    path: path.to_string(),
                    source,
                })?;
            Some(
                tfmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a fetch failure with automatic classification
pub fn log_fetch_failure(source: DataSource, station_id: &str, err: &FetchError) {
    let kind = classify_fetch_failure(err);

    match kind {
        FailureKind::Expected => {
            debug!(%source, station = station_id, %kind, "fetch returned nothing: {}", err)
        }
        FailureKind::Unexpected => {
            error!(%source, station = station_id, %kind, "fetch failed: {}", err)
        }
        FailureKind::Unknown => {
            warn!(%source, station = station_id, %kind, "fetch failed: {}", err)
        }
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a finished polling run
pub fn log_run_summary(station_id: &str, cycles: u64, recorded: u64, empty: u64, write_failures: u64) {
    let message = format!(
        "Run complete: {}/{} cycles recorded, {} empty, {} write failures",
        recorded, cycles, empty, write_failures
    );

    if empty == 0 && write_failures == 0 {
        info!(source = %DataSource::System, station = station_id, "{}", message);
    } else {
        warn!(source = %DataSource::System, station = station_id, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        assert_eq!(classify_fetch_failure(&FetchError::NoFeatures), FailureKind::Expected);
        assert_eq!(classify_fetch_failure(&FetchError::HttpStatus(404)), FailureKind::Expected);
        assert_eq!(classify_fetch_failure(&FetchError::Timeout(30)), FailureKind::Unknown);
        assert_eq!(classify_fetch_failure(&FetchError::ElementMissing), FailureKind::Unknown);
        assert_eq!(classify_fetch_failure(&FetchError::HttpStatus(500)), FailureKind::Unexpected);
        assert_eq!(
            classify_fetch_failure(&FetchError::Malformed("missing field `unit`".into())),
            FailureKind::Unexpected
        );
        assert_eq!(
            classify_fetch_failure(&FetchError::Transport("connection refused".into())),
            FailureKind::Unexpected
        );
    }

    #[test]
    fn test_default_directive_follows_debug_flag() {
        assert!(default_directive(false).starts_with("info,"));
        assert!(default_directive(true).starts_with("debug,"));
        assert!(default_directive(true).contains("hyper=warn"));
    }

    #[test]
    fn test_data_source_labels() {
        assert_eq!(DataSource::Wfs.to_string(), "WFS");
        assert_eq!(DataSource::Page.to_string(), "PAGE");
        assert_eq!(DataSource::Csv.to_string(), "CSV");
        assert_eq!(DataSource::System.to_string(), "SYS");
    }
}
