//! Run configuration for the franking refresh
//!
//! Everything a run needs from its environment is collected here once, at
//! startup, and handed to the refresher.

use std::path::PathBuf;
use std::time::Duration;

use crate::data::DEFAULT_SOURCE_URL;
use crate::lock::DEFAULT_STALE_AFTER;

/// Repository-relative cache file
pub const DEFAULT_CACHE_PATH: &str = "franking_cache.json";

/// Tickers refreshed when none are configured
pub const DEFAULT_CODES: [&str; 4] = ["VHY", "BHP", "CBA", "WOW"];

/// Per-request timeout for the upstream site
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for a refresh run
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// JSON cache file to load and update
    pub cache_path: PathBuf,
    /// Normalised tickers to scrape, in order
    pub codes: Vec<String>,
    /// Dividends page URL template containing `{code}`
    pub source_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Age after which a leftover lock file is ignored
    pub lock_stale_after: Duration,
    /// Report changes without writing the cache file
    pub dry_run: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            codes: DEFAULT_CODES.iter().map(|c| c.to_string()).collect(),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            lock_stale_after: DEFAULT_STALE_AFTER,
            dry_run: false,
        }
    }
}
