//! Layered application configuration.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{admission::AdmissionPolicy, store::JsonFileStore};

/// Config file location relative to the user's config directory.
pub const CONFIG_FILE: &str = "railnet/config.toml";

static DEFAULT_CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE)
});

const DEFAULT_CONFIG: &str = r#"# railnet configuration

# JSON file holding stations, tracks, trains, bookings and closures.
# data_file = "/var/lib/railnet/railways.json"

# Milliseconds a mutation waits for the dataset lock before giving up.
lock_timeout_ms = 2000

[admission]
# Reject routes whose final station is closed.
check_terminal_station = true
"#;

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// JSON snapshot holding the dataset.
    pub data_file: PathBuf,
    /// Upper bound on waiting for the mutation lock.
    pub lock_timeout_ms: u64,
    /// Route admission behaviour.
    #[serde(default)]
    pub admission: AdmissionPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_file: JsonFileStore::default_path(),
            lock_timeout_ms: 2000,
            admission: AdmissionPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Load defaults, the user config file and `RAILNET_*` environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Like [`AppConfig::load`] but reading an explicit config file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults = AppConfig::default();
        let settings = Config::builder()
            .set_default(
                "data_file",
                defaults.data_file.to_string_lossy().to_string(),
            )?
            .set_default("lock_timeout_ms", defaults.lock_timeout_ms as i64)?
            .set_default(
                "admission.check_terminal_station",
                defaults.admission.check_terminal_station,
            )?
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("RAILNET")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        settings
            .try_deserialize()
            .context("invalid railnet configuration")
    }

    /// Lock acquisition bound as a [`Duration`].
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Default config file location.
pub fn config_path() -> PathBuf {
    DEFAULT_CONFIG_PATH.clone()
}

/// Write a commented default config file unless one exists.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG).with_context(|| format!("failed to write {}", path.display()))
}
