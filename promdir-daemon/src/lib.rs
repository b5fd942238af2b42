//! Daemon runtime: supervised bootstrap, poll and event tasks.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{run, run_with_source, start_blocking};
