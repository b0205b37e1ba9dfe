//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default open-data mirror listing for ICON-D2 total precipitation.
pub const DEFAULT_LISTING_URL: &str =
    "https://opendata.dwd.de/weather/nwp/icon-d2/grib/12/tot_prec/";

/// Browser-like identity; the mirror rejects anonymous clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Listing page carrying the current forecast batch.
    pub listing_url: String,
    /// Root directory batches are downloaded into.
    pub download_root: PathBuf,
    /// Root directory wgf4 grids are written into.
    pub output_root: PathBuf,
    /// Files fetched concurrently within one download group.
    pub max_concurrent: usize,
    /// Per-request timeout; a timed-out fetch fails only that file.
    pub request_timeout: Duration,
    /// User-Agent header presented to the mirror.
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            download_root: PathBuf::from("./downloads"),
            output_root: PathBuf::from("./parsed"),
            max_concurrent: 10,
            request_timeout: Duration::from_secs(600),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
