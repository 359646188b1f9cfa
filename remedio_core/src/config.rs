//! Configuration file support for Remedio.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/remedio/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Notification scheduler configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Forward window inside which timers are armed.
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: i64,

    /// Delay added per snooze.
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: i64,

    /// Total snoozes allowed per original firing.
    #[serde(default = "default_max_snoozes")]
    pub max_snoozes: u8,

    /// How often the daemon re-reads the medication set from the store.
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,

    /// Unconditional recompute cadence, well inside the horizon.
    #[serde(default = "default_rearm_hours")]
    pub rearm_hours: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            horizon_hours: default_horizon_hours(),
            snooze_minutes: default_snooze_minutes(),
            max_snoozes: default_max_snoozes(),
            poll_secs: default_poll_secs(),
            rearm_hours: default_rearm_hours(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("remedio")
}

fn default_horizon_hours() -> i64 {
    48
}

fn default_snooze_minutes() -> i64 {
    15
}

fn default_max_snoozes() -> u8 {
    3
}

fn default_poll_secs() -> u64 {
    60
}

fn default_rearm_hours() -> u64 {
    6
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("remedio").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
