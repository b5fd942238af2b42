//! Relevance predicate and file-name resolution.
//!
//! All three convergence strategies go through [`Naming`]; evaluating the
//! marker label anywhere else risks the strategies drifting apart on what
//! counts as a relevant object.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{ConfigEvent, ConfigName, ConfigObject};

/// Which intrinsic identity keys the output file when no override label is
/// set. Picked once per deployment; never mixed within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingScheme {
    /// File named after the object's human-assigned name.
    #[default]
    Name,
    /// File named after the engine-assigned identifier.
    Id,
}

impl fmt::Display for NamingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingScheme::Name => write!(f, "name"),
            NamingScheme::Id => write!(f, "id"),
        }
    }
}

impl FromStr for NamingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(NamingScheme::Name),
            "id" => Ok(NamingScheme::Id),
            other => Err(format!("unknown naming scheme '{other}'; expected: name, id")),
        }
    }
}

/// Naming rules for one deployment: the marker label that makes an object
/// relevant, and the identity scheme for derived file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    marker: String,
    scheme: NamingScheme,
}

impl Naming {
    pub fn new(marker: impl Into<String>, scheme: NamingScheme) -> Self {
        Self {
            marker: marker.into(),
            scheme,
        }
    }

    /// The marker label key, e.g. `io.prometheus.scrape_config`.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// The override label key, `<marker>.name`.
    pub fn name_label(&self) -> String {
        format!("{}.name", self.marker)
    }

    /// An object is relevant iff the marker label is present and non-empty.
    pub fn is_relevant(&self, labels: &HashMap<String, String>) -> bool {
        labels.get(&self.marker).is_some_and(|v| !v.is_empty())
    }

    /// Derive the output file name (without extension) for an object.
    ///
    /// A non-empty `<marker>.name` label wins over the intrinsic identity.
    /// No collision detection: two objects resolving to the same name means
    /// the later write wins.
    pub fn file_name(&self, object: &ConfigObject) -> ConfigName {
        if let Some(next) = object.labels.get(&self.name_label()) {
            if !next.is_empty() {
                return ConfigName::from(next.as_str());
            }
        }
        match self.scheme {
            NamingScheme::Name => object.name.clone(),
            NamingScheme::Id => ConfigName(object.id.0.clone()),
        }
    }

    /// Derive the output file name from a remove event's own attributes.
    ///
    /// The object is no longer inspectable at this point, so the event
    /// attributes are the only identity left. Returns `None` when they carry
    /// neither an override label nor the scheme's identity key.
    pub fn event_file_name(&self, event: &ConfigEvent) -> Option<ConfigName> {
        if let Some(next) = event.attributes.get(&self.name_label()) {
            if !next.is_empty() {
                return Some(ConfigName::from(next.as_str()));
            }
        }
        match self.scheme {
            NamingScheme::Name => event
                .attributes
                .get("name")
                .filter(|name| !name.is_empty())
                .map(|name| ConfigName::from(name.as_str())),
            NamingScheme::Id => Some(ConfigName(event.actor_id.0.clone())),
        }
    }
}
