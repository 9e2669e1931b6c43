//! Append-only CSV persistence.
//!
//! Every call opens the target file in append mode, writes exactly one row
//! and closes it again. No header is written and existing rows are never
//! read or touched. A failed fetch never reaches this module, so a file is
//! only created once there is a row to put in it.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::logging::DataSource;
use crate::model::{Measurement, RecordError};

// ---------------------------------------------------------------------------
// Row layout
// ---------------------------------------------------------------------------

/// Column layout of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayout {
    /// `retrieved_at,station_id,value`
    Compact,
    /// `retrieved_at,station_id,name,value,unit,timestamp`
    Full,
}

/// Builds the fields of one row. Absent optional fields become empty cells
/// so the column count is fixed per layout.
pub fn row_fields(layout: RowLayout, measurement: &Measurement, station_id: &str) -> Vec<String> {
    let retrieved_at = measurement.retrieved_at_str();
    match layout {
        RowLayout::Compact => vec![retrieved_at, station_id.to_string(), measurement.value.clone()],
        RowLayout::Full => vec![
            retrieved_at,
            station_id.to_string(),
            measurement.name.clone().unwrap_or_default(),
            measurement.value.clone(),
            measurement.unit.clone(),
            measurement.timestamp.clone().unwrap_or_default(),
        ],
    }
}

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

/// How the target file is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileNaming {
    /// Fixed path given on the command line.
    Fixed(PathBuf),
    /// `messwerte_<date>.csv` in the output directory.
    DailyPage { dir: PathBuf },
    /// `odlinfo_json_<id>_<date>.csv` in the output directory.
    DailyWfs { dir: PathBuf },
}

impl FileNaming {
    /// Resolves the file for a row retrieved on `date`.
    ///
    /// Pure function of (naming, station, date): two runs on the same day
    /// for the same station always land in the same file.
    pub fn path_for(&self, station_id: &str, date: NaiveDate) -> PathBuf {
        let day = date.format("%Y-%m-%d");
        match self {
            FileNaming::Fixed(path) => path.clone(),
            FileNaming::DailyPage { dir } => dir.join(format!("messwerte_{}.csv", day)),
            FileNaming::DailyWfs { dir } => {
                dir.join(format!("odlinfo_json_{}_{}.csv", station_id, day))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Sink for successful measurements.
pub trait Recorder {
    /// Appends one row and returns the file it went to.
    fn append(&self, measurement: &Measurement, station_id: &str) -> Result<PathBuf, RecordError>;
}

pub struct CsvRecorder {
    naming: FileNaming,
    layout: RowLayout,
}

impl CsvRecorder {
    pub fn new(naming: FileNaming, layout: RowLayout) -> Self {
        Self { naming, layout }
    }

    pub fn layout(&self) -> RowLayout {
        self.layout
    }

    pub fn naming(&self) -> &FileNaming {
        &self.naming
    }
}

impl Recorder for CsvRecorder {
    fn append(&self, measurement: &Measurement, station_id: &str) -> Result<PathBuf, RecordError> {
        let path = self
            .naming
            .path_for(station_id, measurement.retrieved_at.date());
        let fields = row_fields(self.layout, measurement, station_id);
        append_row(&path, &fields)?;

        debug!(source = %DataSource::Csv, station = station_id, "appended row to {}", path.display());
        Ok(path)
    }
}

/// Opens `path` for append (creating it if needed), writes one record and
/// flushes before the handle is dropped.
pub fn append_row(path: &Path, fields: &[String]) -> Result<(), RecordError> {
    let display = || path.display().to_string();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| RecordError::Open { path: display(), source })?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    writer
        .write_record(fields)
        .map_err(|source| RecordError::Write { path: display(), source })?;
    writer
        .flush()
        .map_err(|source| RecordError::Flush { path: display(), source })?;

    Ok(())
}
