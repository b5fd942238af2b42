//! Steady-state event-driven convergence.
//!
//! One sequential consumer applies the engine's config events in delivery
//! order, so a rapid delete-then-recreate of the same name converges as
//! remove-then-write and never reorders. Consumption starts only after the
//! bootstrap pass signals readiness; events arriving earlier wait in the
//! subscription buffer.

use tokio::sync::{broadcast, mpsc, oneshot};

use promdir_core::types::{ConfigEvent, EventAction};
use promdir_core::Naming;
use promdir_source::{ConfigSource, EventSubscription, SourceError};

use crate::error::SyncError;
use crate::store::{OutputStore, WriteOutcome};

/// Consume the event stream until shutdown.
///
/// A stream-level failure is fatal: without the event stream the target
/// would silently drift, so the error propagates and tears the daemon down.
pub async fn run(
    source: &dyn ConfigSource,
    store: &OutputStore,
    naming: &Naming,
    mut subscription: EventSubscription,
    ready: oneshot::Receiver<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SyncError> {
    tokio::select! {
        _ = shutdown_rx.recv() => return Ok(()),
        outcome = ready => {
            // A dropped sender means the bootstrap task failed; its error is
            // already shutting the daemon down.
            if outcome.is_err() {
                return Ok(());
            }
        }
    }

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            maybe_event = subscription.events.recv() => {
                match maybe_event {
                    Some(event) => apply_event(source, store, naming, event).await,
                    None => return Err(stream_failure(&mut subscription.errors)),
                }
            }
        }
    }
}

/// Buffered events drain before the events channel closes, so the stream's
/// terminal error is waiting on the error channel by the time we get here.
fn stream_failure(errors: &mut mpsc::Receiver<SourceError>) -> SyncError {
    match errors.try_recv() {
        Ok(err) => SyncError::EventStream(err.to_string()),
        Err(_) => SyncError::EventStream("event stream ended".to_string()),
    }
}

async fn apply_event(
    source: &dyn ConfigSource,
    store: &OutputStore,
    naming: &Naming,
    event: ConfigEvent,
) {
    match event.action {
        // An update for an identity never written before is just a create;
        // both paths re-fetch and overwrite.
        EventAction::Create | EventAction::Update => {
            let config = match source.inspect_config(&event.actor_id).await {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(id = %event.actor_id, error = %err, "failed to inspect config from event");
                    return;
                }
            };
            if !naming.is_relevant(&config.labels) {
                tracing::debug!(id = %config.id, "event for irrelevant config ignored");
                return;
            }
            let name = naming.file_name(&config);
            match store.write(&name, &config.data) {
                Ok(WriteOutcome::Written { path }) => {
                    tracing::info!(
                        action = %event.action,
                        id = %config.id,
                        name = %config.name,
                        file = %path.display(),
                        at = %event.time,
                        "applied config event",
                    );
                }
                Ok(WriteOutcome::Unchanged { .. }) => {
                    tracing::debug!(id = %config.id, "event carried identical content");
                }
                Err(err) => {
                    tracing::warn!(id = %config.id, error = %err, "failed to write config from event");
                }
            }
        }
        EventAction::Remove => {
            let Some(name) = naming.event_file_name(&event) else {
                tracing::warn!(id = %event.actor_id, "remove event carries no resolvable name");
                return;
            };
            match store.remove(&name) {
                Ok(true) => {
                    tracing::info!(
                        id = %event.actor_id,
                        name = %name,
                        file = %store.path_for(&name).display(),
                        at = %event.time,
                        "removed config",
                    );
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(id = %event.actor_id, error = %err, "failed to remove config from event");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Arc;

    use chrono::Utc;
    use tempfile::TempDir;

    use promdir_core::types::ConfigId;
    use promdir_core::NamingScheme;

    use crate::testing::{labeled_config, MockSource, MockStream};

    fn harness(tmp: &TempDir) -> (OutputStore, Naming) {
        let store = OutputStore::new(tmp.path().join("out"), "yaml");
        store.bootstrap(false).expect("store bootstrap");
        (store, Naming::new("scrape", NamingScheme::Name))
    }

    fn event(action: EventAction, id: &str, attributes: &[(&str, &str)]) -> ConfigEvent {
        ConfigEvent {
            action,
            actor_id: ConfigId::from(id),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            time: Utc::now(),
        }
    }

    /// Drive `run` over a scripted event sequence: send everything, close
    /// the stream with an error, and return the (expectedly fatal) result.
    async fn drive(
        source: Arc<MockSource>,
        store: &OutputStore,
        naming: &Naming,
        stream: MockStream,
        events: Vec<ConfigEvent>,
    ) -> Result<(), SyncError> {
        let subscription = source.subscribe_events().await.expect("subscribe");
        let (ready_tx, ready_rx) = oneshot::channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        for event in events {
            stream.events.send(event).await.expect("inject event");
        }
        stream
            .errors
            .send(SourceError::StreamClosed("test stream done".to_string()))
            .await
            .expect("inject close");
        drop(stream);
        ready_tx.send(()).expect("signal ready");

        run(source.as_ref(), store, naming, subscription, ready_rx, shutdown_rx).await
    }

    #[tokio::test]
    async fn create_event_writes_the_file() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, stream) = MockSource::new();
        source.put_config(labeled_config("c1", "jobA", b"scrape_configs: []", &[("scrape", "true")]));

        let err = drive(
            source.clone(),
            &store,
            &naming,
            stream,
            vec![event(EventAction::Create, "c1", &[])],
        )
        .await
        .expect_err("stream close is fatal");
        assert!(matches!(err, SyncError::EventStream(_)));

        assert_eq!(
            fs::read_to_string(store.path_for(&"jobA".into())).unwrap(),
            "scrape_configs: []"
        );
    }

    #[tokio::test]
    async fn update_event_overwrites_existing_content() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, stream) = MockSource::new();

        store.write(&"jobA".into(), b"scrape_configs: []").unwrap();
        source.put_config(labeled_config("c1", "jobA", b"scrape_configs: [x]", &[("scrape", "true")]));

        drive(
            source.clone(),
            &store,
            &naming,
            stream,
            vec![event(EventAction::Update, "c1", &[])],
        )
        .await
        .expect_err("stream close is fatal");

        assert_eq!(
            fs::read_to_string(store.path_for(&"jobA".into())).unwrap(),
            "scrape_configs: [x]"
        );
    }

    #[tokio::test]
    async fn update_for_unknown_identity_behaves_as_create() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, stream) = MockSource::new();
        source.put_config(labeled_config("c1", "jobA", b"late", &[("scrape", "true")]));

        drive(
            source.clone(),
            &store,
            &naming,
            stream,
            vec![event(EventAction::Update, "c1", &[])],
        )
        .await
        .expect_err("stream close is fatal");

        assert!(store.exists(&"jobA".into()));
    }

    #[tokio::test]
    async fn remove_event_deletes_the_file() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, stream) = MockSource::new();
        store.write(&"jobA".into(), b"data").unwrap();

        drive(
            source.clone(),
            &store,
            &naming,
            stream,
            vec![event(EventAction::Remove, "c1", &[("name", "jobA")])],
        )
        .await
        .expect_err("stream close is fatal");

        assert!(!store.exists(&"jobA".into()));
    }

    #[tokio::test]
    async fn remove_event_honors_override_attribute() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, stream) = MockSource::new();
        store.write(&"custom".into(), b"data").unwrap();

        drive(
            source.clone(),
            &store,
            &naming,
            stream,
            vec![event(
                EventAction::Remove,
                "c1",
                &[("name", "jobA"), ("scrape.name", "custom")],
            )],
        )
        .await
        .expect_err("stream close is fatal");

        assert!(!store.exists(&"custom".into()));
    }

    #[tokio::test]
    async fn create_then_remove_leaves_no_file() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, stream) = MockSource::new();
        source.put_config(labeled_config("c1", "jobA", b"data", &[("scrape", "true")]));

        drive(
            source.clone(),
            &store,
            &naming,
            stream,
            vec![
                event(EventAction::Create, "c1", &[]),
                event(EventAction::Remove, "c1", &[("name", "jobA")]),
            ],
        )
        .await
        .expect_err("stream close is fatal");

        assert!(!store.exists(&"jobA".into()), "ordered consumption must end absent");
    }

    #[tokio::test]
    async fn event_for_unlabeled_config_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, stream) = MockSource::new();
        source.put_config(labeled_config("c1", "jobA", b"data", &[]));

        drive(
            source.clone(),
            &store,
            &naming,
            stream,
            vec![event(EventAction::Create, "c1", &[])],
        )
        .await
        .expect_err("stream close is fatal");

        assert!(!store.exists(&"jobA".into()));
    }

    #[tokio::test]
    async fn labeling_an_object_later_materializes_exactly_one_file() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, stream) = MockSource::new();
        source.put_config(labeled_config("c1", "jobA", b"data", &[]));

        let subscription = source.subscribe_events().await.expect("subscribe");
        let (ready_tx, ready_rx) = oneshot::channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        ready_tx.send(()).expect("ready");

        stream
            .events
            .send(event(EventAction::Create, "c1", &[]))
            .await
            .expect("create");

        // The label lands afterwards; the update event makes it relevant.
        source.put_config(labeled_config("c1", "jobA", b"data", &[("scrape", "true")]));
        stream
            .events
            .send(event(EventAction::Update, "c1", &[]))
            .await
            .expect("update");
        stream
            .errors
            .send(SourceError::StreamClosed("done".to_string()))
            .await
            .expect("close");
        drop(stream);

        run(source.as_ref(), &store, &naming, subscription, ready_rx, shutdown_rx)
            .await
            .expect_err("stream close is fatal");

        let files: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("jobA.yaml")]);
    }

    #[tokio::test]
    async fn shutdown_before_ready_returns_ok() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, _stream) = MockSource::new();
        let subscription = source.subscribe_events().await.expect("subscribe");

        let (_ready_tx, ready_rx) = oneshot::channel::<()>();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).expect("shutdown");

        run(source.as_ref(), &store, &naming, subscription, ready_rx, shutdown_rx)
            .await
            .expect("clean shutdown");
    }

    #[tokio::test]
    async fn inspect_failure_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, stream) = MockSource::new();
        // c1 is never registered with the mock, so the inspect fails.

        drive(
            source.clone(),
            &store,
            &naming,
            stream,
            vec![event(EventAction::Create, "c1", &[])],
        )
        .await
        .expect_err("only the stream close is fatal");

        assert!(fs::read_dir(store.dir()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn stream_error_carries_the_cause() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, stream) = MockSource::new();

        let err = drive(source.clone(), &store, &naming, stream, Vec::new())
            .await
            .expect_err("stream close is fatal");
        assert!(err.to_string().contains("test stream done"));
    }

    #[test]
    fn attributes_helper_builds_expected_map() {
        let event = event(EventAction::Remove, "c1", &[("name", "jobA")]);
        assert_eq!(
            event.attributes,
            HashMap::from([("name".to_string(), "jobA".to_string())])
        );
    }
}
