//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/blink/config.toml)
//! 3. Environment variables (BLINK_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::remote::GistCredentials;
use crate::retention::RetentionPolicy;

/// Environment variable prefix
const ENV_PREFIX: &str = "BLINK";

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the replica database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Gist that stores the shared document
    #[serde(default)]
    pub gist_id: Option<String>,

    /// GitHub token with gist scope
    #[serde(default)]
    pub github_token: Option<String>,

    /// Days of unstarred history published to the remote
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Quiet period before a push, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            gist_id: None,
            github_token: None,
            retention_days: default_retention_days(),
            debounce_ms: default_debounce_ms(),
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (BLINK_DATA_DIR, BLINK_GIST_ID,
    ///    BLINK_GITHUB_TOKEN, BLINK_RETENTION_DAYS)
    /// 2. Config file (~/.config/blink/config.toml or BLINK_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Empty strings clear the value
        if let Ok(val) = std::env::var(format!("{}_GIST_ID", ENV_PREFIX)) {
            self.gist_id = non_empty(val);
        }
        if let Ok(val) = std::env::var(format!("{}_GITHUB_TOKEN", ENV_PREFIX)) {
            self.github_token = non_empty(val);
        }

        if let Ok(val) = std::env::var(format!("{}_RETENTION_DAYS", ENV_PREFIX)) {
            match val.trim().parse() {
                Ok(days) => self.retention_days = days,
                Err(_) => warn!("Ignoring invalid {}_RETENTION_DAYS: {:?}", ENV_PREFIX, val),
            }
        }
    }

    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with BLINK_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blink")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("blink.db")
    }

    /// Remote credentials, if both the gist id and token are set
    pub fn gist_credentials(&self) -> Option<GistCredentials> {
        let gist_id = self.gist_id.as_deref().filter(|s| !s.is_empty())?;
        let token = self.github_token.as_deref().filter(|s| !s.is_empty())?;
        Some(GistCredentials {
            gist_id: gist_id.to_string(),
            token: token.to_string(),
        })
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::from_days(self.retention_days)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn non_empty(val: String) -> Option<String> {
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("blink")
}

fn default_retention_days() -> u32 {
    2
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}
