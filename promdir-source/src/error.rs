use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the engine client and its event subscription.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("engine protocol error: {0}")]
    Protocol(String),

    #[error("orchestration engine is not reachable (socket: {socket})")]
    EngineNotRunning { socket: PathBuf },

    #[error("event stream closed: {0}")]
    StreamClosed(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.into(),
        source,
    }
}
