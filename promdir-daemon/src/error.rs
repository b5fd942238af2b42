use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime and its supervised tasks.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source error: {0}")]
    Source(#[from] promdir_source::SourceError),

    #[error("sync error: {0}")]
    Sync(#[from] promdir_sync::SyncError),

    #[error("daemon runtime error: {0}")]
    Runtime(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
