//! Domain types for promdir.
//!
//! Config objects and events are owned by the orchestration engine; promdir
//! only observes snapshots of them. All types are serializable via serde and
//! match the engine's JSON wire shapes.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Engine-assigned identifier of a config object, stable for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigId(pub String);

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ConfigId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConfigId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Human-assigned name of a config object. Not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigName(pub String);

impl fmt::Display for ConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ConfigName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConfigName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A labeled configuration blob as reported by the engine.
///
/// `data` is opaque to promdir and written verbatim to the output file. On
/// the wire it travels base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigObject {
    pub id: ConfigId,
    pub name: ConfigName,
    #[serde(with = "payload_base64")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// The set of config references a service spec carries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(default)]
    pub config_ids: Vec<ConfigId>,
}

/// A service's current spec plus, after a spec update, its previous one.
///
/// `previous_spec` is the only way to see a config detached from a service;
/// the engine emits no remove event for that. Recomputed from each list
/// call, never cached across poll ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    pub id: String,
    pub name: String,
    pub spec: ServiceSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_spec: Option<ServiceSpec>,
}

/// Lifecycle action reported on the engine's config event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Create,
    Update,
    Remove,
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventAction::Create => write!(f, "create"),
            EventAction::Update => write!(f, "update"),
            EventAction::Remove => write!(f, "remove"),
        }
    }
}

/// One event from the engine's config event stream. Consumed once.
///
/// For remove events the object is no longer inspectable, so `attributes`
/// carries the identity needed to resolve the file name (the object's name
/// and its labels at removal time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEvent {
    pub action: EventAction,
    pub actor_id: ConfigId,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    pub time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Payload encoding
// ---------------------------------------------------------------------------

/// Serde helper: config payloads cross the JSON wire as standard base64.
mod payload_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
