//! Cache manager for the franking file on disk
//!
//! Provides a `CacheManager` bound to a single JSON file. Loading tolerates a
//! missing file (first run), persisting compares the rendered bytes against
//! what is already on disk and skips the write when nothing changed.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::model::Cache;

/// Errors that can occur when reading or writing the cache file
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure reading or writing the cache
    #[error("Cache file {path} I/O error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The existing file is not a valid franking cache
    #[error("Cache file {path} is not a valid franking cache: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory cache could not be serialized
    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What `persist` did with the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// New content was written
    Written,
    /// The file already held identical content
    Unchanged,
}

/// Reads and writes the franking cache file
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Location of the JSON cache file
    path: PathBuf,
}

impl CacheManager {
    /// Creates a manager for the cache file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the cache file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cache, or an empty cache if the file does not exist yet
    ///
    /// # Returns
    /// * `Ok(Cache)` - The stored cache, empty on first run
    /// * `Err(CacheError::Corrupt)` - If the file exists but can't be parsed
    pub fn load(&self) -> Result<Cache, CacheError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cache file yet, starting empty");
                return Ok(Cache::new());
            }
            Err(source) => return Err(self.io_error(source)),
        };

        if content.trim().is_empty() {
            return Ok(Cache::new());
        }

        serde_json::from_str(&content).map_err(|source| CacheError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Renders the cache exactly as it is written to disk
    pub fn render(cache: &Cache) -> Result<String, CacheError> {
        let mut json = serde_json::to_string_pretty(cache)?;
        json.push('\n');
        Ok(json)
    }

    /// Whether persisting `cache` would change the file
    pub fn would_change(&self, cache: &Cache) -> Result<bool, CacheError> {
        let rendered = Self::render(cache)?;
        Ok(self.current_bytes()?.as_deref() != Some(rendered.as_bytes()))
    }

    /// Writes the cache if its content differs from the file on disk
    ///
    /// # Returns
    /// * `Ok(PersistOutcome::Written)` if new content was written
    /// * `Ok(PersistOutcome::Unchanged)` if the file already matched
    /// * `Err(CacheError)` if the directory or file could not be written
    pub fn persist(&self, cache: &Cache) -> Result<PersistOutcome, CacheError> {
        let rendered = Self::render(cache)?;

        if self.current_bytes()?.as_deref() == Some(rendered.as_bytes()) {
            debug!(path = %self.path.display(), "cache content unchanged, skipping write");
            return Ok(PersistOutcome::Unchanged);
        }

        self.write_atomic(rendered.as_bytes())
            .map_err(|source| self.io_error(source))?;
        debug!(path = %self.path.display(), entries = cache.len(), "cache written");
        Ok(PersistOutcome::Written)
    }

    /// Current file bytes, `None` if the file does not exist
    fn current_bytes(&self) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Write atomically via temp file
    fn write_atomic(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let result = (|| {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn io_error(&self, source: io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
