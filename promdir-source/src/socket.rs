//! Unix-socket engine client.
//!
//! One connection per request; the event subscription keeps its connection
//! open and pumps incoming lines into channels from a background task.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

use promdir_core::types::{ConfigEvent, ConfigId, ConfigObject, ServiceState};

use crate::error::{io_err, SourceError};
use crate::protocol::{
    SourceRequest, SourceResponse, CMD_INSPECT_CONFIG, CMD_LIST_CONFIGS, CMD_LIST_SERVICES,
    CMD_SUBSCRIBE_EVENTS,
};
use crate::source::{ConfigSource, EventSubscription};

/// Events buffered while the consumer is busy (e.g. during bootstrap).
const EVENT_BUFFER: usize = 256;

/// Engine client speaking newline-delimited JSON over a Unix socket.
#[derive(Debug, Clone)]
pub struct UnixSource {
    socket: PathBuf,
}

impl UnixSource {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    async fn connect(&self) -> Result<UnixStream, SourceError> {
        UnixStream::connect(&self.socket).await.map_err(|err| {
            if matches!(
                err.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
            ) {
                SourceError::EngineNotRunning {
                    socket: self.socket.clone(),
                }
            } else {
                io_err(&self.socket, err)
            }
        })
    }

    /// Send one request and read one response line.
    async fn round_trip(&self, request: &SourceRequest) -> Result<Value, SourceError> {
        let stream = self.connect().await?;
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        write_request(&mut writer, &self.socket, request).await?;
        let response = read_response(&mut lines, &self.socket).await?;
        response.into_data()
    }
}

#[async_trait::async_trait]
impl ConfigSource for UnixSource {
    async fn list_configs(&self) -> Result<Vec<ConfigObject>, SourceError> {
        let data = self.round_trip(&SourceRequest::new(CMD_LIST_CONFIGS)).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn inspect_config(&self, id: &ConfigId) -> Result<ConfigObject, SourceError> {
        let data = self
            .round_trip(&SourceRequest::with_id(CMD_INSPECT_CONFIG, id.0.clone()))
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn list_services(&self) -> Result<Vec<ServiceState>, SourceError> {
        let data = self.round_trip(&SourceRequest::new(CMD_LIST_SERVICES)).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn subscribe_events(&self) -> Result<EventSubscription, SourceError> {
        let stream = self.connect().await?;
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        write_request(
            &mut writer,
            &self.socket,
            &SourceRequest::new(CMD_SUBSCRIBE_EVENTS),
        )
        .await?;
        let response = read_response(&mut lines, &self.socket).await?;
        response.into_data()?;

        let (event_tx, event_rx) = mpsc::channel::<ConfigEvent>(EVENT_BUFFER);
        let (error_tx, error_rx) = mpsc::channel::<SourceError>(1);
        let socket = self.socket.clone();

        tokio::spawn(async move {
            // Keep the write half alive for the lifetime of the stream so
            // the engine does not see a half-closed connection.
            let _writer = writer;
            pump_events(lines, socket, event_tx, error_tx).await;
        });

        Ok(EventSubscription {
            events: event_rx,
            errors: error_rx,
        })
    }
}

async fn pump_events(
    mut lines: Lines<BufReader<OwnedReadHalf>>,
    socket: PathBuf,
    event_tx: mpsc::Sender<ConfigEvent>,
    error_tx: mpsc::Sender<SourceError>,
) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let event: ConfigEvent = match serde_json::from_str(&line) {
                    Ok(event) => event,
                    Err(err) => {
                        let _ = error_tx
                            .send(SourceError::Protocol(format!(
                                "undecodable event line: {err}"
                            )))
                            .await;
                        return;
                    }
                };
                if event_tx.send(event).await.is_err() {
                    // Consumer dropped the subscription.
                    return;
                }
            }
            Ok(None) => {
                let _ = error_tx
                    .send(SourceError::StreamClosed(
                        "engine closed the event stream".to_string(),
                    ))
                    .await;
                return;
            }
            Err(err) => {
                let _ = error_tx.send(io_err(&socket, err)).await;
                return;
            }
        }
    }
}

async fn write_request(
    writer: &mut OwnedWriteHalf,
    socket: &Path,
    request: &SourceRequest,
) -> Result<(), SourceError> {
    let payload = serde_json::to_string(request)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err(socket, e))?;
    writer.write_all(b"\n").await.map_err(|e| io_err(socket, e))?;
    writer.flush().await.map_err(|e| io_err(socket, e))?;
    Ok(())
}

async fn read_response(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    socket: &Path,
) -> Result<SourceResponse, SourceError> {
    let line = lines
        .next_line()
        .await
        .map_err(|e| io_err(socket, e))?
        .ok_or_else(|| {
            SourceError::Protocol("engine closed connection before responding".to_string())
        })?;
    Ok(serde_json::from_str(line.trim_end())?)
}
