//! The [`ConfigSource`] seam the reconciliation engine is written against.

use async_trait::async_trait;
use tokio::sync::mpsc;

use promdir_core::types::{ConfigEvent, ConfigId, ConfigObject, ServiceState};

use crate::error::SourceError;

/// A live subscription to the engine's config event stream.
///
/// Events arrive in delivery order on `events`; a stream-level failure is
/// delivered once on `errors` and then both channels close. Dropping the
/// subscription tears down the underlying connection.
pub struct EventSubscription {
    pub events: mpsc::Receiver<ConfigEvent>,
    pub errors: mpsc::Receiver<SourceError>,
}

/// Read access to the orchestration engine's config objects and services.
///
/// List and inspect calls may fail transiently (connectivity); the caller
/// decides whether that is fatal. The event subscription failing is always
/// fatal to the reconciliation engine.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// All config objects currently known to the engine.
    async fn list_configs(&self) -> Result<Vec<ConfigObject>, SourceError>;

    /// Fetch a single config object by identifier. Detached objects remain
    /// inspectable until explicitly deleted.
    async fn inspect_config(&self, id: &ConfigId) -> Result<ConfigObject, SourceError>;

    /// All services with their current and, if any, previous spec.
    async fn list_services(&self) -> Result<Vec<ServiceState>, SourceError>;

    /// Open the config-filtered event stream.
    async fn subscribe_events(&self) -> Result<EventSubscription, SourceError>;
}
