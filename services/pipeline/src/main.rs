//! Forecast ingestion pipeline entry point.
//!
//! Downloads the current regular-lat/lon forecast batch from the open-data
//! mirror, then converts every completed batch on disk into wgf4 grid files.
//! A listing fetch failure is fatal; individual file failures are logged and
//! skipped.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pipeline::config::{PipelineConfig, DEFAULT_LISTING_URL, DEFAULT_USER_AGENT};
use pipeline::decoder::GribFileDecoder;
use pipeline::download::Downloader;
use pipeline::watcher::Watcher;

#[derive(Parser, Debug)]
#[command(name = "pipeline")]
#[command(about = "Forecast mirror ingestion and wgf4 conversion")]
struct Args {
    /// Listing page carrying the current forecast batch
    #[arg(long, env = "METEO_DATA_URL", default_value = DEFAULT_LISTING_URL)]
    listing_url: String,

    /// Directory batches are downloaded into
    #[arg(long, env = "DOWNLOAD_DIR", default_value = "./downloads")]
    download_dir: PathBuf,

    /// Directory wgf4 grids are written into
    #[arg(long, env = "PARSED_DIR", default_value = "./parsed")]
    output_dir: PathBuf,

    /// Maximum concurrent downloads within one group
    #[arg(long, default_value = "10")]
    max_concurrent: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "600")]
    request_timeout_secs: u64,

    /// User-Agent header presented to the mirror
    #[arg(long, env = "HTTP_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Skip the download stage; only parse batches already on disk
    #[arg(long, conflicts_with = "download_only")]
    parse_only: bool,

    /// Skip the parse stage; only download
    #[arg(long)]
    download_only: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting forecast ingestion pipeline");

    let config = PipelineConfig {
        listing_url: args.listing_url,
        download_root: args.download_dir,
        output_root: args.output_dir,
        max_concurrent: args.max_concurrent,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        user_agent: args.user_agent,
    };

    tokio::fs::create_dir_all(&config.download_root).await?;
    tokio::fs::create_dir_all(&config.output_root).await?;

    if !args.parse_only {
        let downloader = Downloader::new(&config)?;
        let report = downloader.run().await?;
        info!(
            batch = %report.batch_dir.display(),
            downloaded = report.downloaded,
            failed = report.failed,
            "download stage complete"
        );
    }

    if !args.download_only {
        let watcher = Watcher::new(
            config.download_root.clone(),
            config.output_root.clone(),
            Arc::new(GribFileDecoder),
        );
        let summary = watcher.run().await?;
        info!(
            parsed = summary.parsed,
            failed = summary.failed,
            "parse stage complete"
        );
    }

    Ok(())
}
