//! odlmon - ODL dose-rate poller
//!
//! Fetches the current ambient dose rate for one BfS station on a fixed
//! interval and appends each reading to a CSV file. Stop with Ctrl+C.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};

use odlmon_service::config::Settings;
use odlmon_service::ingest::page::PageFetcher;
use odlmon_service::ingest::wfs::WfsFetcher;
use odlmon_service::ingest::{Fetcher, build_client};
use odlmon_service::logging::{self, DataSource};
use odlmon_service::model::{DEFAULT_INTERVAL_MINUTES, DEFAULT_TIMEOUT_SECS, StationQuery};
use odlmon_service::recorder::{CsvRecorder, FileNaming, Recorder, RowLayout};
use odlmon_service::{Poller, RunSummary, stations};

#[derive(Parser)]
#[command(name = "odlmon")]
#[command(about = "☢️ ODL dose-rate poller for BfS monitoring stations")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (default: ./odlmon.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also append log output to this file
    #[arg(long, global = true)]
    log_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the value shown on the station web page
    Page(PageArgs),

    /// Query the BfS WFS JSON API (name, value, unit, measurement time)
    Json(JsonArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Station id (Kennung), e.g. 031520061
    #[arg(long)]
    id: String,

    /// Seconds to wait for a measurement per attempt
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Minutes between attempts
    #[arg(long, default_value_t = DEFAULT_INTERVAL_MINUTES)]
    interval: u64,

    /// Verbose diagnostic output
    #[arg(long)]
    debug: bool,
}

#[derive(Args)]
struct PageArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output file (default: messwerte_YYYY-MM-DD.csv)
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Args)]
struct JsonArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Fetch once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let debug = match &cli.command {
        Commands::Page(args) => args.common.debug,
        Commands::Json(args) => args.common.debug,
    };
    logging::init_logging(debug, cli.log_file.as_deref())?;

    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    debug!(source = %DataSource::System, "settings: {:?}", settings);

    match cli.command {
        Commands::Page(args) => {
            let query = build_query(&args.common, false)?;
            let naming = match args.csv {
                Some(path) => FileNaming::Fixed(path),
                None => FileNaming::DailyPage {
                    dir: settings.output_dir.clone(),
                },
            };
            let fetcher = PageFetcher::new(
                settings.page_url.clone(),
                settings.wfs_url.clone(),
                settings.user_agent.clone(),
            );
            let recorder = CsvRecorder::new(naming, RowLayout::Compact);
            run(query, fetcher, recorder, &settings).await;
        }
        Commands::Json(args) => {
            let query = build_query(&args.common, args.once)?;
            let client = build_client(&settings.user_agent).context("building HTTP client")?;
            let fetcher = WfsFetcher::new(client, settings.wfs_url.clone());
            let recorder = CsvRecorder::new(
                FileNaming::DailyWfs {
                    dir: settings.output_dir.clone(),
                },
                RowLayout::Full,
            );
            run(query, fetcher, recorder, &settings).await;
        }
    }

    Ok(())
}

fn build_query(args: &CommonArgs, once: bool) -> anyhow::Result<StationQuery> {
    let query = StationQuery::new(&args.id, args.timeout, args.interval, args.debug, once)
        .context("invalid arguments")?;
    if !stations::is_bfs_kennung(&query.station_id) {
        debug!(
            source = %DataSource::System,
            station = query.station_id.as_str(),
            "id is not a 9-digit BfS Kennung; the upstream may return nothing"
        );
    }
    Ok(query)
}

async fn run<F, R>(query: StationQuery, fetcher: F, recorder: R, settings: &Settings)
where
    F: Fetcher,
    R: Recorder,
{
    print_banner(&query, fetcher.source());

    let station = query.station_id.clone();
    let mut poller = Poller::new(query, fetcher, recorder).with_stale_after(settings.stale_after_minutes);
    let summary = poller.run(interrupted()).await;

    if summary.interrupted {
        println!("\n📥 Measurement stopped.");
    }
    log_summary(&station, &summary);
}

/// Completes on Ctrl+C. If the handler cannot be installed the loop runs
/// until the process is killed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(source = %DataSource::System, "cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_banner(query: &StationQuery, source: DataSource) {
    if query.once {
        println!("⏱️ Single {} fetch for station {}", source, query.station_id);
    } else {
        println!(
            "⏱️ Polling station {} via {} every {} min - Ctrl+C to stop",
            query.station_id, source, query.interval_minutes
        );
    }
}

fn log_summary(station: &str, summary: &RunSummary) {
    logging::log_run_summary(
        station,
        summary.cycles,
        summary.recorded,
        summary.empty,
        summary.write_failures,
    );
}
