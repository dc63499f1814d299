//! Command-line interface parsing for the franking cache refresher
//!
//! This module handles parsing of CLI arguments using clap, with environment
//! variable fallbacks for scheduler-provided settings, and turns them into a
//! validated [`RefreshConfig`].

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::config::{RefreshConfig, DEFAULT_CACHE_PATH, DEFAULT_CODES};
use crate::data::{normalise_code, DEFAULT_SOURCE_URL};

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// A configured ticker is not a valid ASX code
    #[error("Invalid ASX code: '{0}'. Codes are 1-6 letters or digits, optionally ending in .AX")]
    InvalidCode(String),

    /// No tickers left to refresh
    #[error("No ASX codes given")]
    NoCodes,

    /// A zero-length timeout would fail every request
    #[error("Timeout must be at least one second")]
    ZeroTimeout,

    /// A zero window would let every run take over a live lock
    #[error("Lock staleness window must be at least one second")]
    ZeroLockWindow,
}

/// Refresh the ASX franking cache from upstream dividend tables
#[derive(Parser, Debug)]
#[command(name = "franking-cache")]
#[command(about = "Refresh the ASX franking cache from upstream dividend tables")]
#[command(version)]
pub struct Cli {
    /// JSON cache file to update
    #[arg(long, env = "FRANKING_CACHE_PATH", value_name = "PATH", default_value = DEFAULT_CACHE_PATH)]
    pub cache: PathBuf,

    /// Comma-separated ASX codes to refresh
    ///
    /// Examples:
    ///   franking-cache --codes VHY,BHP
    ///   franking-cache --codes vhy.ax --codes cba
    #[arg(
        long,
        env = "FRANKING_CODES",
        value_name = "CODES",
        value_delimiter = ',',
        default_values = DEFAULT_CODES
    )]
    pub codes: Vec<String>,

    /// Dividends page URL template; `{code}` is replaced with the ticker
    #[arg(long, env = "FRANKING_SOURCE_URL", value_name = "URL", default_value = DEFAULT_SOURCE_URL)]
    pub source_url: String,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 15)]
    pub timeout_secs: u64,

    /// Treat a lock file older than this many seconds as abandoned
    #[arg(long, value_name = "SECONDS", default_value_t = 3600)]
    pub lock_stale_secs: u64,

    /// Scrape and report changes without writing the cache file
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl RefreshConfig {
    /// Creates a RefreshConfig from parsed CLI arguments.
    ///
    /// Codes are normalised and de-duplicated, keeping first-seen order.
    ///
    /// # Returns
    /// * `Ok(RefreshConfig)` with validated settings
    /// * `Err(CliError)` if a code is invalid or a duration is zero
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut codes: Vec<String> = Vec::with_capacity(cli.codes.len());
        for raw in &cli.codes {
            let code = normalise_code(raw).ok_or_else(|| CliError::InvalidCode(raw.clone()))?;
            if !codes.contains(&code) {
                codes.push(code);
            }
        }

        if codes.is_empty() {
            return Err(CliError::NoCodes);
        }
        if cli.timeout_secs == 0 {
            return Err(CliError::ZeroTimeout);
        }
        if cli.lock_stale_secs == 0 {
            return Err(CliError::ZeroLockWindow);
        }

        Ok(RefreshConfig {
            cache_path: cli.cache.clone(),
            codes,
            source_url: cli.source_url.clone(),
            timeout: Duration::from_secs(cli.timeout_secs),
            lock_stale_after: Duration::from_secs(cli.lock_stale_secs),
            dry_run: cli.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args_uses_defaults() {
        let cli = Cli::parse_from(["franking-cache"]);
        assert_eq!(cli.cache, PathBuf::from("franking_cache.json"));
        assert_eq!(cli.codes, vec!["VHY", "BHP", "CBA", "WOW"]);
        assert_eq!(cli.timeout_secs, 15);
        assert!(!cli.dry_run);
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_parse_comma_separated_codes() {
        let cli = Cli::parse_from(["franking-cache", "--codes", "vhy,bhp.ax"]);
        assert_eq!(cli.codes, vec!["vhy", "bhp.ax"]);
    }

    #[test]
    fn test_cli_parse_repeated_codes() {
        let cli = Cli::parse_from(["franking-cache", "--codes", "VHY", "--codes", "CBA"]);
        assert_eq!(cli.codes, vec!["VHY", "CBA"]);
    }

    #[test]
    fn test_cli_parse_all_flags() {
        let cli = Cli::parse_from([
            "franking-cache",
            "--cache",
            "data/cache.json",
            "--source-url",
            "http://localhost:8080/{code}",
            "--timeout-secs",
            "3",
            "--lock-stale-secs",
            "60",
            "--dry-run",
            "--debug",
        ]);
        assert_eq!(cli.cache, PathBuf::from("data/cache.json"));
        assert_eq!(cli.source_url, "http://localhost:8080/{code}");
        assert_eq!(cli.timeout_secs, 3);
        assert_eq!(cli.lock_stale_secs, 60);
        assert!(cli.dry_run);
        assert!(cli.debug);
    }

    #[test]
    fn test_config_from_cli_normalises_and_dedups() {
        let cli = Cli::parse_from(["franking-cache", "--codes", "vhy, VHY.AX,bhp"]);
        let config = RefreshConfig::from_cli(&cli).unwrap();
        assert_eq!(config.codes, vec!["VHY", "BHP"]);
    }

    #[test]
    fn test_config_from_cli_carries_settings() {
        let cli = Cli::parse_from([
            "franking-cache",
            "--timeout-secs",
            "5",
            "--lock-stale-secs",
            "90",
            "--dry-run",
        ]);
        let config = RefreshConfig::from_cli(&cli).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.lock_stale_after, Duration::from_secs(90));
        assert!(config.dry_run);
    }

    #[test]
    fn test_config_from_cli_invalid_code() {
        let cli = Cli::parse_from(["franking-cache", "--codes", "VHY,B-HP"]);
        let err = RefreshConfig::from_cli(&cli).unwrap_err();
        assert!(err.to_string().contains("Invalid ASX code"));
        assert!(err.to_string().contains("B-HP"));
    }

    #[test]
    fn test_config_from_cli_zero_timeout() {
        let cli = Cli::parse_from(["franking-cache", "--timeout-secs", "0"]);
        assert!(matches!(
            RefreshConfig::from_cli(&cli),
            Err(CliError::ZeroTimeout)
        ));
    }

    #[test]
    fn test_config_from_cli_zero_lock_window() {
        let cli = Cli::parse_from(["franking-cache", "--lock-stale-secs", "0"]);
        let err = RefreshConfig::from_cli(&cli).unwrap_err();
        assert!(matches!(err, CliError::ZeroLockWindow));
        assert!(err.to_string().contains("Lock staleness window"));
    }
}
