//! # promdir-sync
//!
//! The file store and the three convergence strategies that keep the output
//! directory matching the engine's set of relevant config objects:
//!
//! - [`bootstrap`] — one-shot startup pass, writes missing files only
//! - [`poll`] — periodic service-spec diff, the only detector of
//!   detachment-without-deletion
//! - [`events`] — the steady-state path, applies the live event stream

pub mod bootstrap;
mod error;
pub mod events;
pub mod poll;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use bootstrap::BootstrapSummary;
pub use error::SyncError;
pub use poll::PollSummary;
pub use store::{OutputStore, WriteOutcome};
