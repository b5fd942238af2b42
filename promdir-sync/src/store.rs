//! Digest-gated output directory store.
//!
//! ## `write` — skip-identical protocol
//!
//! 1. SHA-256 hash the incoming payload.
//! 2. Read and hash the current on-disk bytes (absent file hashes to none).
//! 3. Identical → report `Unchanged`, touch nothing.
//! 4. Otherwise create-or-truncate, write verbatim, flush.
//!
//! Skipping identical content keeps a downstream file-watcher from seeing
//! truncate/rewrite cycles that carry no new bytes. Writes are not atomic
//! against concurrent readers mid-write; the collector re-reads its config
//! directory periodically and tolerates that.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};

use promdir_core::types::ConfigName;

use crate::error::{io_err, SyncError};

/// Pause after cleaning the directory so a downstream file-watcher sees the
/// deletes settle before the first bootstrap write lands.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped — on-disk content already matches the payload.
    Unchanged { path: PathBuf },
}

/// The output directory: one flat file per relevant config object.
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
    ext: String,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>, ext: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            ext: ext.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path for a resolved file name: `<dir>/<name>.<ext>`.
    pub fn path_for(&self, name: &ConfigName) -> PathBuf {
        self.dir.join(format!("{}.{}", name, self.ext))
    }

    /// Ensure the directory exists; unless `keep_existing`, remove every
    /// regular file directly under it (subdirectories untouched) and wait
    /// for the deletes to settle.
    pub fn bootstrap(&self, keep_existing: bool) -> Result<(), SyncError> {
        self.bootstrap_with_settle(keep_existing, SETTLE_DELAY)
    }

    fn bootstrap_with_settle(
        &self,
        keep_existing: bool,
        settle: Duration,
    ) -> Result<(), SyncError> {
        if !self.dir.exists() {
            tracing::info!(dir = %self.dir.display(), "creating output directory");
            create_dir_restricted(&self.dir)?;
            return Ok(());
        }

        if keep_existing {
            tracing::info!(dir = %self.dir.display(), "keeping existing files in output directory");
            return Ok(());
        }

        tracing::info!(dir = %self.dir.display(), "cleaning existing files in output directory");
        let mut removed = 0usize;
        let entries = fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&self.dir, e))?;
            let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
            if !ty.is_file() {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(err) => {
                    tracing::warn!(file = %entry.path().display(), error = %err, "failed to remove file");
                }
            }
        }

        if removed > 0 && !settle.is_zero() {
            std::thread::sleep(settle);
        }
        Ok(())
    }

    /// Write the payload verbatim, skipping the write when the on-disk
    /// content already matches.
    pub fn write(&self, name: &ConfigName, data: &[u8]) -> Result<WriteOutcome, SyncError> {
        let path = self.path_for(name);

        match fs::read(&path) {
            Ok(existing) => {
                if digest(&existing) == digest(data) {
                    tracing::debug!(file = %path.display(), "unchanged");
                    return Ok(WriteOutcome::Unchanged { path });
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(io_err(&path, err)),
        }

        let mut file = fs::File::create(&path).map_err(|e| io_err(&path, e))?;
        file.write_all(data).map_err(|e| io_err(&path, e))?;
        file.flush().map_err(|e| io_err(&path, e))?;

        tracing::debug!(file = %path.display(), bytes = data.len(), "wrote");
        Ok(WriteOutcome::Written { path })
    }

    /// Delete the file if present. A missing file is not an error.
    pub fn remove(&self, name: &ConfigName) -> Result<bool, SyncError> {
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(file = %path.display(), "removed");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_err(&path, err)),
        }
    }

    pub fn exists(&self, name: &ConfigName) -> bool {
        self.path_for(name).is_file()
    }
}

fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

#[cfg(unix)]
fn create_dir_restricted(dir: &Path) -> Result<(), SyncError> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o750)
        .create(dir)
        .map_err(|e| io_err(dir, e))
}

#[cfg(not(unix))]
fn create_dir_restricted(dir: &Path) -> Result<(), SyncError> {
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))
}
