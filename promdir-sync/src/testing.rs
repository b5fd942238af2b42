//! In-memory [`ConfigSource`] used by the strategy tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use promdir_core::types::{ConfigEvent, ConfigId, ConfigName, ConfigObject, ServiceState};
use promdir_source::{ConfigSource, EventSubscription, SourceError};

/// Senders the test uses to drive the mock's event stream.
pub struct MockStream {
    pub events: mpsc::Sender<ConfigEvent>,
    pub errors: mpsc::Sender<SourceError>,
}

pub struct MockSource {
    configs: Mutex<HashMap<ConfigId, ConfigObject>>,
    services: Mutex<Vec<ServiceState>>,
    subscription: Mutex<Option<EventSubscription>>,
}

impl MockSource {
    pub fn new() -> (Arc<Self>, MockStream) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (error_tx, error_rx) = mpsc::channel(1);
        let mock = Arc::new(Self {
            configs: Mutex::new(HashMap::new()),
            services: Mutex::new(Vec::new()),
            subscription: Mutex::new(Some(EventSubscription {
                events: event_rx,
                errors: error_rx,
            })),
        });
        (
            mock,
            MockStream {
                events: event_tx,
                errors: error_tx,
            },
        )
    }

    pub fn put_config(&self, config: ConfigObject) {
        self.configs
            .lock()
            .expect("configs lock")
            .insert(config.id.clone(), config);
    }

    pub fn set_services(&self, services: Vec<ServiceState>) {
        *self.services.lock().expect("services lock") = services;
    }
}

#[async_trait]
impl ConfigSource for MockSource {
    async fn list_configs(&self) -> Result<Vec<ConfigObject>, SourceError> {
        let mut configs: Vec<ConfigObject> =
            self.configs.lock().expect("configs lock").values().cloned().collect();
        configs.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(configs)
    }

    async fn inspect_config(&self, id: &ConfigId) -> Result<ConfigObject, SourceError> {
        self.configs
            .lock()
            .expect("configs lock")
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::Protocol(format!("no such config: {id}")))
    }

    async fn list_services(&self) -> Result<Vec<ServiceState>, SourceError> {
        Ok(self.services.lock().expect("services lock").clone())
    }

    async fn subscribe_events(&self) -> Result<EventSubscription, SourceError> {
        self.subscription
            .lock()
            .expect("subscription lock")
            .take()
            .ok_or_else(|| SourceError::Protocol("already subscribed".to_string()))
    }
}

/// A relevant config object with the given labels on top of the marker.
pub fn labeled_config(id: &str, name: &str, data: &[u8], labels: &[(&str, &str)]) -> ConfigObject {
    ConfigObject {
        id: ConfigId::from(id),
        name: ConfigName::from(name),
        data: data.to_vec(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}
