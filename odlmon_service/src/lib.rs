//! ODL dose-rate monitoring service.
//!
//! Polls the German federal ambient dose-rate network (BfS ODL) for one
//! station and appends every reading it gets to a daily CSV file.
//!
//! - `model`     — measurement, station query, error types
//! - `stations`  — station id validation
//! - `config`    — TOML / environment settings
//! - `logging`   — tracing setup and failure classification
//! - `ingest`    — the WFS and station page fetchers
//! - `recorder`  — append-only CSV writer
//! - `staleness` — source timestamp age checks
//! - `poller`    — the fetch/record loop

pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod poller;
pub mod recorder;
pub mod staleness;
pub mod stations;

pub use ingest::{FetchOutcome, Fetcher};
pub use model::{FetchError, Measurement, RecordError, StationQuery};
pub use poller::{Poller, PollerState, RunSummary};
pub use recorder::{CsvRecorder, FileNaming, Recorder, RowLayout};
