//! The fetch/record loop.
//!
//! A [`Poller`] owns one station query, one fetcher and one recorder. Each
//! cycle fetches once, appends a row if and only if the fetch produced a
//! measurement, then waits for the configured interval. Both the fetch and
//! the wait are raced against a shutdown future; the row write is not, so an
//! interrupt can never leave half a row behind.
//!
//! Failures never end the loop. An empty fetch is a warning, a failed write
//! is an error in the log, and the next cycle runs as scheduled.

use std::future::Future;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::ingest::{FetchOutcome, Fetcher};
use crate::logging::{self, DataSource};
use crate::model::{Measurement, StationQuery};
use crate::recorder::Recorder;
use crate::staleness;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Running,
    Stopped,
}

/// Counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub recorded: u64,
    pub empty: u64,
    pub write_failures: u64,
    /// The run ended because the shutdown future completed.
    pub interrupted: bool,
}

/// What a single cycle did.
#[derive(Debug, PartialEq)]
pub enum CycleOutcome {
    Recorded(PathBuf),
    Empty,
    WriteFailed,
}

pub struct Poller<F, R> {
    query: StationQuery,
    fetcher: F,
    recorder: R,
    stale_after_minutes: Option<u64>,
    state: PollerState,
    summary: RunSummary,
}

impl<F: Fetcher, R: Recorder> Poller<F, R> {
    pub fn new(query: StationQuery, fetcher: F, recorder: R) -> Self {
        Self {
            query,
            fetcher,
            recorder,
            stale_after_minutes: None,
            state: PollerState::Running,
            summary: RunSummary::default(),
        }
    }

    /// Warn when a measurement's source timestamp is older than `minutes`.
    pub fn with_stale_after(mut self, minutes: u64) -> Self {
        self.stale_after_minutes = Some(minutes);
        self
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn query(&self) -> &StationQuery {
        &self.query
    }

    /// One fetch followed by at most one append. Not cancellable.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self
            .fetcher
            .fetch(&self.query.station_id, self.query.timeout())
            .await;
        self.handle(outcome)
    }

    /// Runs until `shutdown` completes, or after the first cycle in once
    /// mode. Returns the counters for the run.
    pub async fn run<S>(&mut self, shutdown: S) -> RunSummary
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.state = PollerState::Running;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.summary.interrupted = true;
                    break;
                }
                outcome = self.fetcher.fetch(&self.query.station_id, self.query.timeout()) => outcome,
            };
            self.handle(outcome);

            if self.query.once {
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.summary.interrupted = true;
                    break;
                }
                _ = tokio::time::sleep(self.query.interval()) => {}
            }
        }

        self.state = PollerState::Stopped;
        self.summary
    }

    fn handle(&mut self, outcome: FetchOutcome) -> CycleOutcome {
        self.summary.cycles += 1;
        let station = self.query.station_id.as_str();
        let source = self.fetcher.source();

        match outcome {
            FetchOutcome::Found(measurement) => {
                self.warn_if_stale(&measurement);
                match self.recorder.append(&measurement, station) {
                    Ok(path) => {
                        self.summary.recorded += 1;
                        match source {
                            DataSource::Page => info!(
                                %source,
                                station,
                                "{} {} saved to {}",
                                measurement.value,
                                measurement.unit,
                                path.display()
                            ),
                            _ => {
                                info!(%source, station, "{}", measurement.summary());
                                debug!(%source, station, "appended to {}", path.display());
                            }
                        }
                        CycleOutcome::Recorded(path)
                    }
                    Err(e) => {
                        self.summary.write_failures += 1;
                        error!(source = %DataSource::Csv, station, "measurement not saved: {}", e);
                        CycleOutcome::WriteFailed
                    }
                }
            }
            FetchOutcome::Empty(err) => {
                self.summary.empty += 1;
                warn!(%source, station, "No measurement available");
                if self.query.debug {
                    logging::log_fetch_failure(source, station, &err);
                }
                CycleOutcome::Empty
            }
        }
    }

    fn warn_if_stale(&self, measurement: &Measurement) {
        let Some(max_age) = self.stale_after_minutes else {
            return;
        };
        if staleness::is_stale(measurement, max_age) == Some(true) {
            warn!(
                source = %self.fetcher.source(),
                station = self.query.station_id.as_str(),
                "source timestamp {} is older than {} minutes",
                measurement.timestamp.as_deref().unwrap_or("?"),
                max_age
            );
        }
    }
}
