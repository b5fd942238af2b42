//! Promdir core library — domain types, naming rules, settings.
//!
//! Public API surface:
//! - [`types`] — newtypes and domain structs shared with the engine client
//! - [`naming`] — relevance predicate and file-name resolution
//! - [`settings`] — defaults, YAML settings file, flag resolution

pub mod naming;
pub mod settings;
pub mod types;

pub use naming::{Naming, NamingScheme};
pub use settings::{Settings, SettingsError, SettingsFile, SettingsOverrides};
pub use types::{
    ConfigEvent, ConfigId, ConfigName, ConfigObject, EventAction, ServiceSpec, ServiceState,
};
