//! Periodic service-spec diff convergence.
//!
//! The engine emits no remove event for a config detached from a service by
//! a spec update, so each tick compares every service's previous spec with
//! its current one and removes the files of configs that dropped out. Each
//! tick recomputes from a fresh listing; nothing carries over between ticks.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use promdir_core::Naming;
use promdir_source::ConfigSource;

use crate::error::SyncError;
use crate::store::OutputStore;

/// Outcome of one diff pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Files created for configs in a current spec that had none.
    pub written: usize,
    /// Files removed for configs detached from a service.
    pub removed: usize,
}

/// Run one service-spec diff pass.
///
/// Per-object inspect/write/remove failures are logged and skipped; the next
/// tick re-derives everything from a fresh listing.
pub async fn run_once(
    source: &dyn ConfigSource,
    store: &OutputStore,
    naming: &Naming,
) -> Result<PollSummary, SyncError> {
    let services = source.list_services().await?;
    let mut summary = PollSummary::default();

    for service in &services {
        if let Some(previous) = &service.previous_spec {
            let current: HashSet<_> = service.spec.config_ids.iter().collect();
            for id in previous.config_ids.iter().filter(|id| !current.contains(id)) {
                // Detached configs stay inspectable until deleted outright.
                let config = match source.inspect_config(id).await {
                    Ok(config) => config,
                    Err(err) => {
                        tracing::warn!(service = %service.name, id = %id, error = %err, "failed to inspect detached config");
                        continue;
                    }
                };
                if !naming.is_relevant(&config.labels) {
                    continue;
                }
                let name = naming.file_name(&config);
                match store.remove(&name) {
                    Ok(true) => {
                        tracing::info!(
                            service = %service.name,
                            id = %config.id,
                            name = %config.name,
                            file = %store.path_for(&name).display(),
                            "removed detached config",
                        );
                        summary.removed += 1;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(id = %config.id, error = %err, "failed to remove detached config");
                    }
                }
            }
        }

        for id in &service.spec.config_ids {
            let config = match source.inspect_config(id).await {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(service = %service.name, id = %id, error = %err, "failed to inspect config");
                    continue;
                }
            };
            if !naming.is_relevant(&config.labels) {
                continue;
            }
            let name = naming.file_name(&config);
            if store.exists(&name) {
                continue;
            }
            match store.write(&name, &config.data) {
                Ok(_) => {
                    tracing::info!(
                        service = %service.name,
                        id = %config.id,
                        name = %config.name,
                        file = %store.path_for(&name).display(),
                        "created config",
                    );
                    summary.written += 1;
                }
                Err(err) => {
                    tracing::warn!(id = %config.id, error = %err, "failed to write config");
                }
            }
        }
    }

    Ok(summary)
}

/// Run diff passes on a fixed interval until shutdown.
///
/// A failed listing is transient here: logged, retried next tick. Missed
/// ticks are skipped rather than bursted.
pub async fn run_loop(
    source: &dyn ConfigSource,
    store: &OutputStore,
    naming: &Naming,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SyncError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // consume the first immediate tick

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                match run_once(source, store, naming).await {
                    Ok(summary) if summary.written > 0 || summary.removed > 0 => {
                        tracing::info!(written = summary.written, removed = summary.removed, "service diff pass applied changes");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "service diff pass failed");
                    }
                }
            }
        }
    }

    Ok(())
}
