//! Directory watcher: turns completed download batches into wgf4 grids.
//!
//! A batch directory counts as ready once its completion marker exists.
//! Ready directories are processed one after another; the files inside a
//! directory are parsed fully concurrently, with differencing serialized by
//! the shared baseline store.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::future;
use tokio::fs;
use tracing::{info, instrument, warn};

use grid_extract::{extract_frame, BaselineStore, ExtractError, ForecastDecoder};
use meteo_common::FileName;
use wgf4::serialize_frame;

use crate::download::MARKER_FILE;

/// Fixed name of the per-valid-time output grid.
pub const OUTPUT_FILE: &str = "PRATE.wgf4";

/// Extension of decodable forecast files inside a batch directory.
const FORECAST_EXT: &str = "grib2";

/// Outcome counts for one watcher run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub parsed: usize,
    pub failed: usize,
}

/// Watches the download tree and drives per-file parsing.
pub struct Watcher {
    download_root: PathBuf,
    output_root: PathBuf,
    decoder: Arc<dyn ForecastDecoder>,
    baselines: BaselineStore,
}

impl Watcher {
    pub fn new(
        download_root: PathBuf,
        output_root: PathBuf,
        decoder: Arc<dyn ForecastDecoder>,
    ) -> Self {
        Self {
            download_root,
            output_root,
            decoder,
            baselines: BaselineStore::new(),
        }
    }

    /// Process every completed batch currently on disk.
    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        for dir in self.ready_directories().await? {
            info!(directory = %dir.display(), "parsing batch directory");
            match self.parse_directory(&dir).await {
                Ok(dir_summary) => {
                    summary.parsed += dir_summary.parsed;
                    summary.failed += dir_summary.failed;
                }
                Err(e) => {
                    warn!(directory = %dir.display(), error = %e, "batch directory failed");
                }
            }
        }

        info!(
            parsed = summary.parsed,
            failed = summary.failed,
            elapsed = ?started.elapsed(),
            "parse run complete"
        );

        Ok(summary)
    }

    /// One-time snapshot of batch directories whose marker is present.
    async fn ready_directories(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();

        let mut entries = fs::read_dir(&self.download_root)
            .await
            .with_context(|| format!("failed to list {}", self.download_root.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path();
            if fs::try_exists(path.join(MARKER_FILE)).await.unwrap_or(false) {
                dirs.push(path);
            }
        }

        dirs.sort();
        Ok(dirs)
    }

    /// Parse every regular-grid file in one completed batch directory.
    #[instrument(skip(self, dir), fields(directory = %dir.display()))]
    async fn parse_directory(&self, dir: &Path) -> Result<RunSummary> {
        let files = self.list_forecast_files(dir).await?;

        // One output directory per model, created before any parsing starts
        // so concurrent tasks never race on it.
        let models: BTreeSet<&str> = files.iter().map(|f| f.model_name.as_str()).collect();
        for model in models {
            let model_dir = self.output_root.join(model);
            fs::create_dir_all(&model_dir)
                .await
                .with_context(|| format!("failed to create {}", model_dir.display()))?;
        }

        let results =
            future::join_all(files.iter().map(|name| self.parse_file(dir, name))).await;

        let mut summary = RunSummary::default();
        for (name, result) in files.iter().zip(results) {
            match result {
                Ok(path) => {
                    info!(file = %name.full_name(), output = %path.display(), "file parsed");
                    summary.parsed += 1;
                }
                Err(e) => {
                    warn!(file = %name.full_name(), error = %e, "parse failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Decodable regular-grid files in a batch directory, lexically sorted to
    /// fix processing order across runs.
    async fn list_forecast_files(&self, dir: &Path) -> Result<Vec<FileName>> {
        let mut names = Vec::new();

        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("failed to list {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !file_name.ends_with(FORECAST_EXT) {
                continue;
            }

            match FileName::parse(file_name) {
                Ok(parsed) if parsed.is_regular_grid() => names.push(parsed),
                Ok(_) => {}
                Err(e) => warn!(file = %file_name, error = %e, "skipping unparseable file"),
            }
        }

        names.sort_by_key(FileName::full_name);
        Ok(names)
    }

    /// Decode, extract, and serialize a single forecast file.
    #[instrument(skip(self, dir), fields(file = %name.full_name()))]
    async fn parse_file(&self, dir: &Path, name: &FileName) -> Result<PathBuf> {
        let input = dir.join(name.full_name());

        let rows = self
            .decoder
            .decode(&input)
            .await
            .map_err(|e| ExtractError::Decode {
                file: name.full_name(),
                reason: format!("{e:#}"),
            })?;

        let frame = extract_frame(name, &rows, &self.baselines)?;

        let out_dir = self
            .output_root
            .join(&name.model_name)
            .join(name.output_date());
        fs::create_dir_all(&out_dir)
            .await
            .with_context(|| format!("failed to create {}", out_dir.display()))?;

        let out_path = out_dir.join(OUTPUT_FILE);
        let bytes = serialize_frame(&frame.header, &frame.values);
        fs::write(&out_path, &bytes)
            .await
            .with_context(|| format!("failed to write {}", out_path.display()))?;

        Ok(out_path)
    }
}
