//! End-to-end: fetcher → poller → CSV file, against a loopback server.

mod common;

use std::fs;
use std::time::Duration;

use common::{STATION, WFS_BODY, page_body, serve};
use odlmon_service::ingest::build_client;
use odlmon_service::ingest::page::PageFetcher;
use odlmon_service::ingest::wfs::WfsFetcher;
use odlmon_service::model::StationQuery;
use odlmon_service::poller::{Poller, PollerState};
use odlmon_service::recorder::{CsvRecorder, FileNaming, RowLayout};

fn wfs_recorder(dir: &std::path::Path) -> CsvRecorder {
    CsvRecorder::new(FileNaming::DailyWfs { dir: dir.to_path_buf() }, RowLayout::Full)
}

#[tokio::test]
async fn once_mode_writes_single_row_for_successful_fetch() {
    let server = serve(vec![(200, WFS_BODY.to_string())]).await;
    let dir = tempfile::tempdir().unwrap();
    let query = StationQuery::new(STATION, 5, 5, false, true).unwrap();
    let fetcher = WfsFetcher::new(build_client("odlmon-test").unwrap(), server.base_url.clone());

    let mut poller = Poller::new(query, fetcher, wfs_recorder(dir.path()));
    let summary = poller.run(std::future::pending()).await;

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.recorded, 1);
    assert_eq!(server.hits(), 1);
    assert_eq!(poller.state(), PollerState::Stopped);

    let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
    let path = files[0].as_ref().unwrap().path();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("odlinfo_json_031520061_"), "{}", name);

    let content = fs::read_to_string(&path).unwrap();
    let rows: Vec<&str> = content.lines().collect();
    assert_eq!(rows.len(), 1);
    let fields: Vec<&str> = rows[0].split(',').collect();
    assert_eq!(fields.len(), 6);
    assert_eq!(
        &fields[1..],
        &["031520061", "Musterstadt", "0.082", "µSv/h", "2024-01-01T12:00:00Z"]
    );
    // local wall clock, "YYYY-MM-DD HH:MM:SS"
    assert_eq!(fields[0].len(), 19);
}

#[tokio::test]
async fn once_mode_failed_fetch_creates_no_file() {
    let server = serve(vec![(500, "boom".to_string())]).await;
    let dir = tempfile::tempdir().unwrap();
    let query = StationQuery::new(STATION, 5, 5, true, true).unwrap();
    let fetcher = WfsFetcher::new(build_client("odlmon-test").unwrap(), server.base_url.clone());

    let mut poller = Poller::new(query, fetcher, wfs_recorder(dir.path()));
    let summary = poller.run(std::future::pending()).await;

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.empty, 1);
    assert_eq!(summary.recorded, 0);
    assert_eq!(server.hits(), 1, "exactly one fetch attempt");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn interrupt_between_cycles_leaves_only_complete_rows() {
    let server = serve(vec![(200, page_body("0,082"))]).await;
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("out.csv");
    let query = StationQuery::new(STATION, 5, 1, false, false).unwrap();
    let fetcher = PageFetcher::new(server.base_url.clone(), server.base_url.clone(), "odlmon-test");
    let recorder = CsvRecorder::new(FileNaming::Fixed(csv.clone()), RowLayout::Compact);

    let mut poller = Poller::new(query, fetcher, recorder);
    // Stop while the poller waits out its one-minute interval.
    let summary = poller
        .run(tokio::time::sleep(Duration::from_secs(2)))
        .await;

    assert!(summary.interrupted);
    assert_eq!(summary.cycles, 1);
    let content = fs::read_to_string(&csv).unwrap();
    assert!(content.ends_with('\n'), "row must be complete: {:?}", content);
    assert_eq!(content.lines().count(), 1);
    assert!(content.trim_end().ends_with(r#",031520061,"0,082""#), "{:?}", content);
}
