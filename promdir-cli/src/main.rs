//! Promdir — scrape config files from an orchestration engine.
//!
//! # Usage
//!
//! ```text
//! promdir [--output-dir <dir>] [--output-ext <ext>] [--keep-existing]
//!         [--poll-interval-secs <n>] [--scrape-label <label>]
//!         [--name-by name|id] [--engine-socket <path>] [--config <file>]
//! ```
//!
//! Resolution order for every setting: built-in default, then the optional
//! `--config` YAML file, then the explicit flag.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;

use promdir_core::settings::{Settings, SettingsFile, SettingsOverrides};
use promdir_core::NamingScheme;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "promdir",
    version,
    about = "Keep a directory of scrape config files in sync with an orchestration engine",
    long_about = None,
)]
struct Cli {
    /// Directory for the config files [default: /etc/prometheus/configs].
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Extension for the config files [default: yaml].
    #[arg(long)]
    output_ext: Option<String>,

    /// Keep existing files in the output directory at startup.
    #[arg(long)]
    keep_existing: bool,

    /// How frequently to evaluate service configs, in seconds [default: 15].
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Label that identifies scrape config objects
    /// [default: io.prometheus.scrape_config].
    #[arg(long)]
    scrape_label: Option<String>,

    /// File naming identity: name or id [default: name].
    #[arg(long)]
    name_by: Option<NamingSchemeArg>,

    /// Unix socket of the orchestration engine
    /// [default: /var/run/promdir/engine.sock].
    #[arg(long)]
    engine_socket: Option<PathBuf>,

    /// Optional YAML settings file; explicit flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Shared NamingScheme argument — parsed from CLI strings, converts to core
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse [`NamingScheme`] from CLI args.
#[derive(Debug, Clone, Default)]
pub struct NamingSchemeArg(pub NamingScheme);

impl FromStr for NamingSchemeArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NamingScheme::from_str(s).map(Self)
    }
}

impl fmt::Display for NamingSchemeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<NamingSchemeArg> for NamingScheme {
    fn from(arg: NamingSchemeArg) -> Self {
        arg.0
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => Some(
            SettingsFile::load(path)
                .with_context(|| format!("failed to load settings file {}", path.display()))?,
        ),
        None => None,
    };

    let overrides = SettingsOverrides {
        output_dir: cli.output_dir,
        output_ext: cli.output_ext,
        // A bare flag can only turn the behavior on; absence defers to the
        // settings file.
        keep_existing: cli.keep_existing.then_some(true),
        poll_interval_secs: cli.poll_interval_secs,
        scrape_label: cli.scrape_label,
        name_by: cli.name_by.map(Into::into),
        engine_socket: cli.engine_socket,
    };

    let settings = Settings::resolve(file, overrides);
    promdir_daemon::start_blocking(settings).context("daemon exited with error")
}
