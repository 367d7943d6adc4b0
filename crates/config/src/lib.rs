//! Configuration loading for the parallax classification index.
//!
//! Settings are merged from three layers, later layers winning: built-in
//! defaults, an optional TOML file, and `PARALLAX_`-prefixed environment
//! variables (nested keys separated by `__`, e.g.
//! `PARALLAX_SCAN__CHECKPOINT_INTERVAL=50`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "PARALLAX_";

/// Where the persistent index lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file. Created on first use.
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        // Platform data dir when resolvable, current directory otherwise
        // (e.g. inside containers with no HOME).
        let path = ProjectDirs::from("dev", "parallax", "parallax")
            .map(|dirs| dirs.data_dir().join("index.sqlite3"))
            .unwrap_or_else(|| PathBuf::from("parallax-index.sqlite3"));
        Self { path }
    }
}

/// Tunables for the scan orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Flush in-memory classification state every N processed items.
    ///
    /// This bounds data loss on abrupt termination; it is not a correctness
    /// knob. Must be at least 1.
    pub checkpoint_interval: usize,
    /// Page size used when listing the visible library from the catalog.
    pub page_size: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self { checkpoint_interval: 25, page_size: 200 }
    }
}

/// Merged application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub scan: ScanSettings,
}

impl Settings {
    /// Load settings from defaults, an optional TOML file, and environment
    /// variables, then validate the merged result.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "merging configuration file");
            figment = figment.merge(Toml::file(file));
        }
        let settings: Settings = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.scan.checkpoint_interval == 0 {
            exn::bail!(ErrorKind::Invalid("scan.checkpoint_interval must be at least 1"));
        }
        if self.scan.page_size == 0 {
            exn::bail!(ErrorKind::Invalid("scan.page_size must be at least 1"));
        }
        Ok(())
    }
}
