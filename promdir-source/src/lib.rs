//! # promdir-source
//!
//! Read-only adapter for the orchestration engine: list and inspect labeled
//! config objects, list services, and subscribe to the config event stream.
//!
//! [`ConfigSource`] is the seam the reconciliation engine is written
//! against; [`UnixSource`] is the production implementation speaking
//! newline-delimited JSON over the engine's Unix socket.

mod error;
pub mod protocol;
mod socket;
mod source;

pub use error::SourceError;
pub use socket::UnixSource;
pub use source::{ConfigSource, EventSubscription};
