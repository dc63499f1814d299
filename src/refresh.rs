//! Franking cache refresh run
//!
//! One run takes the lock, loads the cache, scrapes every configured ticker in
//! turn, merges the fresh figures over the stored ones and persists the result
//! if anything changed. A fetch or whole-page parse failure aborts the run
//! before the cache file is touched.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{merge, CacheEntry, CacheError, CacheManager, PersistOutcome};
use crate::config::RefreshConfig;
use crate::data::{parse_dividends, weighted_franking, DividendSource, FetchError, ParseError};
use crate::lock::{LockError, RunLock};

/// Errors that abort a refresh run
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The dividend source could not be set up
    #[error("Invalid source configuration: {0}")]
    Source(#[source] FetchError),

    /// A dividends page could not be fetched
    #[error("Failed to fetch dividends for {code}: {source}")]
    Fetch {
        code: String,
        #[source]
        source: FetchError,
    },

    /// A dividends page had no usable table
    #[error("Failed to parse dividends page for {code}: {source}")]
    Parse {
        code: String,
        #[source]
        source: ParseError,
    },

    /// The cache file could not be read or written
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Another run holds the lock
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    /// Tickers whose pages were fetched and parsed
    pub fetched: usize,
    /// Tickers added or updated in the cache
    pub changed: Vec<String>,
    /// Tickers scraped again with the same figures
    pub unchanged: Vec<String>,
    /// Tickers with no dividend in the trailing window, left as they were
    pub no_recent_dividends: Vec<String>,
    /// Malformed table rows skipped across all pages
    pub skipped_rows: usize,
    /// Whether the cache file was written
    pub written: bool,
}

impl RefreshReport {
    /// Logs the run summary
    pub fn log(&self) {
        info!(
            fetched = self.fetched,
            changed = ?self.changed,
            unchanged = self.unchanged.len(),
            no_recent_dividends = ?self.no_recent_dividends,
            skipped_rows = self.skipped_rows,
            written = self.written,
            "refresh complete"
        );
    }
}

/// Runs franking cache refreshes for a fixed configuration
#[derive(Debug)]
pub struct Refresher {
    config: RefreshConfig,
    source: DividendSource,
    cache: CacheManager,
}

impl Refresher {
    /// Creates a refresher, validating the source URL template
    pub fn new(config: RefreshConfig) -> Result<Self, RefreshError> {
        let source =
            DividendSource::new(&config.source_url, config.timeout).map_err(RefreshError::Source)?;
        let cache = CacheManager::new(config.cache_path.clone());

        Ok(Self {
            config,
            source,
            cache,
        })
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Performs one refresh run
    ///
    /// # Returns
    /// * `Ok(RefreshReport)` - What changed and whether the file was written
    /// * `Err(RefreshError)` - On any fatal error; the cache file is left as it was
    pub async fn run(&self) -> Result<RefreshReport, RefreshError> {
        let _lock = RunLock::acquire(
            RunLock::path_for(self.cache.path()),
            self.config.lock_stale_after,
        )?;

        let existing = self.cache.load()?;
        info!(
            path = %self.cache.path().display(),
            entries = existing.len(),
            codes = self.config.codes.len(),
            "starting franking refresh"
        );

        let now = Utc::now();
        let today = now.date_naive();
        let mut report = RefreshReport::default();
        let mut candidates = Vec::with_capacity(self.config.codes.len());

        for code in &self.config.codes {
            let page = self
                .source
                .fetch(code)
                .await
                .map_err(|source| RefreshError::Fetch {
                    code: code.clone(),
                    source,
                })?;

            let table = parse_dividends(&page).map_err(|source| RefreshError::Parse {
                code: code.clone(),
                source,
            })?;
            report.fetched += 1;

            if table.skipped > 0 {
                warn!(%code, skipped = table.skipped, "skipped malformed dividend rows");
            }
            report.skipped_rows += table.skipped;

            match weighted_franking(&table.records, today) {
                Some(summary) => {
                    info!(
                        %code,
                        franking = summary.franking,
                        dividend12 = summary.dividend12,
                        "scraped franking"
                    );
                    candidates.push((
                        code.clone(),
                        CacheEntry::scraped(summary.franking, summary.dividend12, now),
                    ));
                }
                None => {
                    info!(%code, "no dividends in the last 12 months, keeping cached entry");
                    report.no_recent_dividends.push(code.clone());
                }
            }
        }

        let outcome = merge(&existing, candidates);
        report.changed = outcome.changed;
        report.unchanged = outcome.unchanged;

        report.written = if self.config.dry_run {
            let would_write = self.cache.would_change(&outcome.cache)?;
            info!(would_write, "dry run, cache file not written");
            false
        } else {
            self.cache.persist(&outcome.cache)? == PersistOutcome::Written
        };

        Ok(report)
    }
}
