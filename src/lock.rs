//! Single-instance guard for refresh runs
//!
//! A run holds `<cache file>.lock` for as long as the [`RunLock`] is alive. The
//! lock file is created with `create_new` and carries a per-acquire token, so a
//! second run started while the first is still going fails instead of racing it
//! on the cache file, and a guard only ever removes its own lock file. A lock
//! left behind by a killed run is taken over once it is older than the
//! configured staleness window.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lock files older than this are assumed to belong to a dead run
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Errors that can occur when taking the run lock
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run holds a fresh lock
    #[error("Another refresh is already running (lock file {path}, held for {held_secs}s)")]
    Held { path: PathBuf, held_secs: u64 },

    /// The lock file could not be created or inspected
    #[error("Lock file {path} I/O error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Guard for an exclusive refresh run, released on drop
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    /// `<pid> <uuid>`, written into the lock file
    token: String,
}

impl RunLock {
    /// Lock file location for a cache file: `franking_cache.json.lock`
    pub fn path_for(cache_path: &Path) -> PathBuf {
        with_suffix(cache_path, ".lock")
    }

    /// Takes the lock at `path`
    ///
    /// # Returns
    /// * `Ok(RunLock)` - The lock is held until the guard is dropped
    /// * `Err(LockError::Held)` - A fresh lock already exists
    pub fn acquire(path: PathBuf, stale_after: Duration) -> Result<Self, LockError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| io_error(&path, source))?;
        }

        let token = format!("{} {}", std::process::id(), Uuid::new_v4());

        match create_lock_file(&path, &token) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                match lock_age(&path) {
                    Ok(age) if age <= stale_after => {
                        return Err(LockError::Held {
                            path,
                            held_secs: age.as_secs(),
                        });
                    }
                    Ok(_) => take_over(&path, stale_after)?,
                    // Released between our create and the age check
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => return Err(LockError::Io { path, source }),
                }
                create_lock_file(&path, &token).map_err(|source| held_or_io(&path, source))?;
            }
            Err(source) => return Err(LockError::Io { path, source }),
        }

        debug!(path = %path.display(), %token, "run lock acquired");
        Ok(Self { path, token })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ownership token stored in the lock file
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim() == self.token => match fs::remove_file(&self.path) {
                Ok(()) => debug!(path = %self.path.display(), "run lock released"),
                Err(error) => {
                    warn!(path = %self.path.display(), %error, "failed to remove lock file")
                }
            },
            Ok(_) => warn!(
                path = %self.path.display(),
                "lock file was taken over by another run, leaving it in place"
            ),
            Err(error) => warn!(path = %self.path.display(), %error, "lock file vanished before release"),
        }
    }
}

/// Moves a stale lock out of the way so a fresh one can be created.
///
/// The stale file is renamed to a unique name first; of several runs racing
/// the same takeover only one rename succeeds. If the file moved turns out to
/// be fresh, another run replaced the stale lock in the meantime, so it is
/// linked back into place and the lock is reported as held.
fn take_over(path: &Path, stale_after: Duration) -> Result<(), LockError> {
    let parked = with_suffix(path, &format!(".stale-{}", Uuid::new_v4()));

    match fs::rename(path, &parked) {
        Ok(()) => {}
        // Another run moved it first; the create that follows decides the winner
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(io_error(path, source)),
    }

    let age = lock_age(&parked).map_err(|source| io_error(path, source))?;
    if age <= stale_after {
        if let Err(error) = fs::hard_link(&parked, path) {
            if error.kind() != io::ErrorKind::AlreadyExists {
                warn!(path = %path.display(), %error, "failed to restore live lock file");
            }
        }
        remove_parked(&parked);
        return Err(LockError::Held {
            path: path.to_path_buf(),
            held_secs: age.as_secs(),
        });
    }

    warn!(
        path = %path.display(),
        age_secs = age.as_secs(),
        "taking over stale lock from an earlier run"
    );
    remove_parked(&parked);
    Ok(())
}

fn remove_parked(parked: &Path) {
    if let Err(error) = fs::remove_file(parked) {
        warn!(path = %parked.display(), %error, "failed to remove stale lock file");
    }
}

/// Creates the lock file holding `token`, failing if it already exists
fn create_lock_file(path: &Path, token: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{token}")?;
    file.sync_all()
}

fn lock_age(path: &Path) -> io::Result<Duration> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn held_or_io(path: &Path, source: io::Error) -> LockError {
    if source.kind() == io::ErrorKind::AlreadyExists {
        LockError::Held {
            path: path.to_path_buf(),
            held_secs: 0,
        }
    } else {
        io_error(path, source)
    }
}

fn io_error(path: &Path, source: io::Error) -> LockError {
    LockError::Io {
        path: path.to_path_buf(),
        source,
    }
}
