//! Daemon Configuration
//!
//! Configuration management for the COSMIC Messages daemon. The file lives at
//! `$XDG_CONFIG_HOME/cosmic/cosmic-messages/daemon.toml` and is created with
//! defaults on first start.

use anyhow::{bail, Context, Result};
use cosmic_messages_core::QueryCriteria;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "cosmic-messages";
const CONFIG_FILE: &str = "daemon.toml";
const DATABASE_FILE: &str = "messages.db";

/// Daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Conversation cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Message store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Conversation list configuration
    #[serde(default)]
    pub list: ListConfig,

    /// Watch mode configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Storage paths
    pub paths: PathConfig,
}

/// Conversation cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a loaded list is reused before reloading, in seconds
    #[serde(default = "default_freshness_window")]
    pub freshness_window_secs: u64,
}

/// Message store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file (defaults to `messages.db` in the data directory)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Conversation list configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListConfig {
    /// Maximum number of conversations to load (unset = all)
    #[serde(default)]
    pub page_size: Option<usize>,

    /// Only list conversations with unread messages
    #[serde(default)]
    pub unread_only: bool,
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Refresh interval in seconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Directory polled for incoming SMS packet files (unset = none)
    #[serde(default)]
    pub inbox_dir: Option<PathBuf>,
}

/// Storage paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Configuration directory
    pub config_dir: PathBuf,

    /// Data directory (message database)
    pub data_dir: PathBuf,
}

fn default_freshness_window() -> u64 {
    30
}

fn default_refresh_interval() -> u64 {
    5
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: default_freshness_window(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            inbox_dir: None,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from(".local/share"))
                .join("cosmic")
                .join(APP_DIR),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("cosmic")
        .join(APP_DIR)
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_dir().join(CONFIG_FILE))
    }

    /// Load configuration from a file, creating a default one if missing
    pub fn load_from<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let config = if config_path.exists() {
            let contents =
                fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            let mut config = Config::default();
            if let Some(dir) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                config.paths.config_dir = dir.to_path_buf();
            }
            config.save()?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.paths.config_dir).context("Failed to create config directory")?;

        let config_path = self.paths.config_dir.join(CONFIG_FILE);
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.watch.refresh_interval_secs == 0 {
            bail!("watch.refresh_interval_secs must be greater than zero");
        }
        if self.list.page_size == Some(0) {
            bail!("list.page_size must be greater than zero when set");
        }
        Ok(())
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.paths.config_dir).context("Failed to create config directory")?;
        fs::create_dir_all(&self.paths.data_dir).context("Failed to create data directory")?;
        Ok(())
    }

    /// Path of the message database
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| self.paths.data_dir.join(DATABASE_FILE))
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.cache.freshness_window_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.watch.refresh_interval_secs)
    }

    /// Query criteria for the conversation list
    pub fn query_criteria(&self) -> QueryCriteria {
        let criteria = match self.list.page_size {
            Some(limit) => QueryCriteria::all().with_limit(limit),
            None => QueryCriteria::all(),
        };
        if self.list.unread_only {
            criteria.unread_only()
        } else {
            criteria
        }
    }
}
