//! Listing discovery and bounded-fan-out downloading.
//!
//! One run grabs a single batch: the listing page is scraped for
//! regular-grid file names, files are fetched in sequential groups of
//! `max_concurrent`, decompressed next to the compressed artifact, and the
//! batch is sealed with a completion marker once everything is durable.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, ensure, Context, Result};
use futures::future;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use meteo_common::FileName;

use crate::config::PipelineConfig;

/// Completion marker sealing a batch directory. Its presence, not its
/// content, signals readiness to the watcher.
pub const MARKER_FILE: &str = "log.txt";

/// Outcome of one download run.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    /// Batch directory the files landed in.
    pub batch_dir: PathBuf,
    pub downloaded: usize,
    pub failed: usize,
}

/// Downloads one batch of regular-grid forecast files from the mirror.
pub struct Downloader {
    client: Client,
    listing_url: String,
    download_root: PathBuf,
    max_concurrent: usize,
}

impl Downloader {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        ensure!(config.max_concurrent > 0, "max_concurrent must be positive");

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("invalid user-agent header")?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            listing_url: config.listing_url.clone(),
            download_root: config.download_root.clone(),
            max_concurrent: config.max_concurrent,
        })
    }

    /// Run one download cycle: discover, fetch, seal the batch.
    pub async fn run(&self) -> Result<DownloadReport> {
        let started = Instant::now();

        let names = self.discover().await?;
        ensure!(!names.is_empty(), "listing contained no regular-grid files");

        // The whole listing belongs to one model run; its hour names the batch.
        let batch_dir = self.download_root.join(&names[0].date_hour);
        fs::create_dir_all(&batch_dir)
            .await
            .with_context(|| format!("failed to create {}", batch_dir.display()))?;

        let mut downloaded = 0usize;
        let mut failed = 0usize;

        // Groups run strictly sequentially; files within a group concurrently.
        for group in names.chunks(self.max_concurrent) {
            let results =
                future::join_all(group.iter().map(|name| self.download_one(&batch_dir, name)))
                    .await;

            for (name, result) in group.iter().zip(results) {
                match result {
                    Ok(()) => downloaded += 1,
                    Err(e) => {
                        warn!(file = %name.full_name(), error = %e, "download failed");
                        failed += 1;
                    }
                }
            }
        }

        self.write_marker(&batch_dir, downloaded).await?;

        info!(
            batch = %batch_dir.display(),
            downloaded,
            failed,
            elapsed = ?started.elapsed(),
            "grab complete"
        );

        Ok(DownloadReport {
            batch_dir,
            downloaded,
            failed,
        })
    }

    /// Fetch the listing page and keep regular-grid names, order preserved.
    async fn discover(&self) -> Result<Vec<FileName>> {
        let response = self
            .client
            .get(&self.listing_url)
            .send()
            .await
            .context("listing request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("listing fetch failed: {}", response.status()));
        }

        let body = response.text().await.context("listing body read failed")?;

        let mut names = Vec::new();
        // The first anchor is the parent-directory link by mirror convention.
        for link in extract_links(&body).into_iter().skip(1) {
            match FileName::parse(&link) {
                Ok(parsed) if parsed.is_regular_grid() => names.push(parsed),
                Ok(_) => {}
                Err(e) => warn!(file = %link, error = %e, "skipping unparseable listing entry"),
            }
        }

        info!(count = names.len(), url = %self.listing_url, "discovered regular-grid files");
        Ok(names)
    }

    /// Fetch one file, write it durably, and decompress it in place.
    #[instrument(skip(self, batch_dir), fields(file = %name.full_name()))]
    async fn download_one(&self, batch_dir: &Path, name: &FileName) -> Result<()> {
        let file_name = name.full_name();
        let url = format!("{}/{}", self.listing_url.trim_end_matches('/'), file_name);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("file request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("fetch failed: {}", response.status()));
        }

        let payload = response.bytes().await.context("file body read failed")?;
        let path = batch_dir.join(&file_name);
        write_durable(&path, &payload).await?;

        decompress_in_place(&path).await?;

        info!(bytes = payload.len(), "file saved");
        Ok(())
    }

    /// Seal the batch once every file in it is durable.
    ///
    /// Written to a temp sibling and renamed into place so the watcher can
    /// never observe the marker before the batch's files.
    async fn write_marker(&self, batch_dir: &Path, count: usize) -> Result<()> {
        let content = format!(
            "Files count: {count}\nFinished at: {}\n",
            chrono::Utc::now().to_rfc3339()
        );

        let tmp = batch_dir.join(format!("{MARKER_FILE}.tmp"));
        write_durable(&tmp, content.as_bytes()).await?;
        fs::rename(&tmp, batch_dir.join(MARKER_FILE))
            .await
            .context("marker rename failed")?;

        Ok(())
    }
}

/// Pull anchor targets out of an HTML directory listing, order preserved.
pub fn extract_links(body: &str) -> Vec<String> {
    let mut links = Vec::new();
    for line in body.lines() {
        let mut rest = line;
        while let Some(start) = rest.find("href=\"") {
            let tail = &rest[start + 6..];
            let Some(end) = tail.find('"') else { break };
            links.push(tail[..end].to_string());
            rest = &tail[end..];
        }
    }
    links
}

/// Write bytes and fsync before returning.
async fn write_durable(path: &Path, payload: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(payload).await.context("write failed")?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Compression codecs recognized by their file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Bzip2,
    Gzip,
}

/// Map a compressed artifact to its codec and suffix-stripped sibling path.
fn detect_codec(path: &Path) -> Option<(Codec, PathBuf)> {
    let name = path.file_name()?.to_str()?;
    if let Some(stem) = name.strip_suffix(".bz2") {
        Some((Codec::Bzip2, path.with_file_name(stem)))
    } else if let Some(stem) = name.strip_suffix(".gz") {
        Some((Codec::Gzip, path.with_file_name(stem)))
    } else {
        None
    }
}

/// Decompress a downloaded artifact next to itself, keeping the original.
///
/// Runs on the blocking pool; decompression is CPU-bound and must stay off
/// the async I/O path.
async fn decompress_in_place(path: &Path) -> Result<()> {
    let Some((codec, target)) = detect_codec(path) else {
        return Ok(()); // already uncompressed
    };

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        use std::io::Read;

        let file = std::fs::File::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let mut decompressed = Vec::new();
        match codec {
            Codec::Bzip2 => {
                bzip2::read::BzDecoder::new(file)
                    .read_to_end(&mut decompressed)
                    .context("bz2 decompression failed")?;
            }
            Codec::Gzip => {
                flate2::read::GzDecoder::new(file)
                    .read_to_end(&mut decompressed)
                    .context("gzip decompression failed")?;
            }
        }

        std::fs::write(&target, decompressed)
            .with_context(|| format!("failed to write {}", target.display()))?;
        Ok(())
    })
    .await
    .context("decompression task panicked")??;

    Ok(())
}
