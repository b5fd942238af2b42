//! Supervised daemon runtime.
//!
//! Four tasks run under one broadcast shutdown signal: the bootstrap pass
//! (runs once, then parks until shutdown so its success does not stop the
//! group), the periodic service-diff loop, the sequential event consumer,
//! and the signal watcher. Every task wrapper re-broadcasts shutdown when
//! its task returns, the coordinator joins all of them, and the first error
//! in join order wins.

use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};

use promdir_core::Settings;
use promdir_source::{ConfigSource, UnixSource};
use promdir_sync::{bootstrap, events, poll, OutputStore};

use crate::error::{io_err, DaemonError};

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(settings: Settings) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(settings))
}

/// Run the daemon against the engine socket named in the settings.
pub async fn run(settings: Settings) -> Result<(), DaemonError> {
    let source = Arc::new(UnixSource::new(settings.engine_socket.clone()));
    run_with_source(source, settings).await
}

/// Run the daemon against any [`ConfigSource`].
pub async fn run_with_source(
    source: Arc<dyn ConfigSource>,
    settings: Settings,
) -> Result<(), DaemonError> {
    tracing::info!(
        output_dir = %settings.output_dir.display(),
        scrape_label = %settings.scrape_label,
        name_by = %settings.name_by,
        poll_interval_secs = settings.poll_interval.as_secs(),
        "starting promdir",
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(signal_watcher(shutdown, shutdown_rx))
    };

    let outcome = supervise(source, settings, shutdown_tx.clone()).await;

    // A startup failure exits before any task could broadcast; make sure
    // the signal watcher is released either way.
    let _ = shutdown_tx.send(());
    let signal_result = signal_handle.await;

    outcome?;
    handle_join("signal_watcher", signal_result)?;
    tracing::info!("promdir stopped");
    Ok(())
}

async fn supervise(
    source: Arc<dyn ConfigSource>,
    settings: Settings,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let store = OutputStore::new(settings.output_dir.clone(), settings.output_ext.clone());
    let naming = settings.naming();

    // Prepare the output directory first; failing here is fatal before any
    // reconciliation happens.
    {
        let store = store.clone();
        let keep_existing = settings.keep_existing;
        tokio::task::spawn_blocking(move || store.bootstrap(keep_existing))
            .await
            .map_err(|err| DaemonError::Runtime(format!("store bootstrap join error: {err}")))??;
    }

    // Subscribe before the bootstrap listing so events raised in between
    // buffer in the subscription instead of being lost.
    let subscription = source.subscribe_events().await?;

    let (ready_tx, ready_rx) = oneshot::channel::<()>();

    let bootstrap_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let source = source.clone();
        let store = store.clone();
        let naming = naming.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                result = bootstrap::run(source.as_ref(), &store, &naming) => result,
            };
            match result {
                Ok(summary) => {
                    tracing::info!(
                        written = summary.written,
                        skipped = summary.skipped,
                        "bootstrap pass completed",
                    );
                    let _ = ready_tx.send(());
                    // Park: the one-shot pass completing must not stop the
                    // long-running tasks.
                    let _ = shutdown_rx.recv().await;
                    Ok(())
                }
                Err(err) => {
                    let _ = shutdown.send(());
                    Err(DaemonError::from(err))
                }
            }
        })
    };

    let poll_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let source = source.clone();
        let store = store.clone();
        let naming = naming.clone();
        let interval = settings.poll_interval;
        tokio::spawn(async move {
            let result =
                poll::run_loop(source.as_ref(), &store, &naming, interval, shutdown_rx).await;
            let _ = shutdown.send(());
            result.map_err(DaemonError::from)
        })
    };

    let event_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let source = source.clone();
        let store = store.clone();
        let naming = naming.clone();
        tokio::spawn(async move {
            let result = events::run(
                source.as_ref(),
                &store,
                &naming,
                subscription,
                ready_rx,
                shutdown_rx,
            )
            .await;
            let _ = shutdown.send(());
            result.map_err(DaemonError::from)
        })
    };

    let (bootstrap_result, poll_result, event_result) =
        tokio::join!(bootstrap_handle, poll_handle, event_handle);

    handle_join("bootstrap", bootstrap_result)?;
    handle_join("poll_loop", poll_result)?;
    handle_join("event_consumer", event_result)?;
    Ok(())
}

async fn signal_watcher(
    shutdown: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|err| DaemonError::Runtime(format!("SIGTERM handler failed: {err}")))?;

    tokio::select! {
        _ = shutdown_rx.recv() => Ok(()),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                tracing::info!("received interrupt, shutting down");
                let _ = shutdown.send(());
                Ok(())
            }
            Err(err) => Err(DaemonError::Runtime(format!(
                "interrupt handler failed: {err}"
            ))),
        },
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down");
            let _ = shutdown.send(());
            Ok(())
        }
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
