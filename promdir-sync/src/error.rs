//! Error types for promdir-sync.

use std::path::PathBuf;

use thiserror::Error;

use promdir_source::SourceError;

/// All errors that can arise from store and reconciliation operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error from the engine client.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// The event subscription failed; the engine can no longer be tracked.
    #[error("event stream failed: {0}")]
    EventStream(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
