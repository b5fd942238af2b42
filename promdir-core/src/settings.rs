//! Runtime settings: defaults, optional YAML settings file, flag overrides.
//!
//! Resolution order is defaults < settings file < explicit flags. The CLI
//! passes every flag as an `Option`, so only flags the operator actually set
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::naming::{Naming, NamingScheme};

pub const DEFAULT_OUTPUT_DIR: &str = "/etc/prometheus/configs";
pub const DEFAULT_OUTPUT_EXT: &str = "yaml";
pub const DEFAULT_SCRAPE_LABEL: &str = "io.prometheus.scrape_config";
pub const DEFAULT_ENGINE_SOCKET: &str = "/var/run/promdir/engine.sock";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// All errors that can arise from loading the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Underlying I/O failure reading the settings file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory the scrape config files are written to.
    pub output_dir: PathBuf,
    /// Extension appended to every resolved file name.
    pub output_ext: String,
    /// Keep files already present in the output directory at startup.
    pub keep_existing: bool,
    /// Interval between service-spec diff passes.
    pub poll_interval: Duration,
    /// Marker label that makes a config object relevant.
    pub scrape_label: String,
    /// Identity scheme for derived file names.
    pub name_by: NamingScheme,
    /// Unix socket of the orchestration engine.
    pub engine_socket: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_ext: DEFAULT_OUTPUT_EXT.to_string(),
            keep_existing: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            scrape_label: DEFAULT_SCRAPE_LABEL.to_string(),
            name_by: NamingScheme::Name,
            engine_socket: PathBuf::from(DEFAULT_ENGINE_SOCKET),
        }
    }
}

impl Settings {
    /// The naming rules derived from these settings.
    pub fn naming(&self) -> Naming {
        Naming::new(self.scrape_label.clone(), self.name_by)
    }

    /// Resolve settings from an optional file and the flags the operator set.
    pub fn resolve(file: Option<SettingsFile>, flags: SettingsOverrides) -> Self {
        let mut settings = Settings::default();
        if let Some(file) = file {
            settings.apply_file(file);
        }
        settings.apply_overrides(flags);
        settings
    }

    fn apply_file(&mut self, file: SettingsFile) {
        if let Some(dir) = file.output_dir {
            self.output_dir = dir;
        }
        if let Some(ext) = file.output_ext {
            self.output_ext = ext;
        }
        if let Some(keep) = file.keep_existing {
            self.keep_existing = keep;
        }
        if let Some(secs) = file.poll_interval_secs {
            self.poll_interval = Duration::from_secs(secs);
        }
        if let Some(label) = file.scrape_label {
            self.scrape_label = label;
        }
        if let Some(scheme) = file.name_by {
            self.name_by = scheme;
        }
        if let Some(socket) = file.engine_socket {
            self.engine_socket = socket;
        }
    }

    fn apply_overrides(&mut self, flags: SettingsOverrides) {
        if let Some(dir) = flags.output_dir {
            self.output_dir = dir;
        }
        if let Some(ext) = flags.output_ext {
            self.output_ext = ext;
        }
        if let Some(keep) = flags.keep_existing {
            self.keep_existing = keep;
        }
        if let Some(secs) = flags.poll_interval_secs {
            self.poll_interval = Duration::from_secs(secs);
        }
        if let Some(label) = flags.scrape_label {
            self.scrape_label = label;
        }
        if let Some(scheme) = flags.name_by {
            self.name_by = scheme;
        }
        if let Some(socket) = flags.engine_socket {
            self.engine_socket = socket;
        }
    }
}

/// Operator-edited YAML settings file. Every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub output_dir: Option<PathBuf>,
    pub output_ext: Option<String>,
    pub keep_existing: Option<bool>,
    pub poll_interval_secs: Option<u64>,
    pub scrape_label: Option<String>,
    pub name_by: Option<NamingScheme>,
    pub engine_socket: Option<PathBuf>,
}

impl SettingsFile {
    /// Load a settings file from disk.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Flags the operator actually passed; `None` means "not set".
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub output_dir: Option<PathBuf>,
    pub output_ext: Option<String>,
    pub keep_existing: Option<bool>,
    pub poll_interval_secs: Option<u64>,
    pub scrape_label: Option<String>,
    pub name_by: Option<NamingScheme>,
    pub engine_socket: Option<PathBuf>,
}
