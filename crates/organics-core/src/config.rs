//! Application configuration management.
//!
//! Configuration is stored at `~/.config/organics/config.json`. Every field
//! has a default, so a missing or partial file is fine. A handful of
//! environment variables override the file after loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{FileTokenStorage, KeyringTokenStorage, TokenStorage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "organics";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "https://tiktok-organics-1.onrender.com";

const DEFAULT_CONNECT_URL: &str = "https://www.tiktok.com/v2/auth/authorize?client_key=7480734602387030017&scope=user.info.basic%2Cvideo.list%2Cbiz.creator.info%2Cbiz.creator.insights%2Cuser.info.username%2Cuser.info.stats%2Cuser.info.profile%2Cuser.account.type%2Cuser.insights&response_type=code&redirect_uri=https%3A%2F%2Ftiktok-organics-1.onrender.com%2F";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_ACCOUNT_LIMIT: usize = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "ORGANICS_API_URL";
pub const ENV_CONNECT_URL: &str = "ORGANICS_CONNECT_URL";
pub const ENV_POLL_SECS: &str = "ORGANICS_POLL_SECS";

/// Where the session credential is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    /// `session.json` in the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// OAuth authorization URL offered to the operator for connecting a new
    /// account. Opaque; never parsed.
    pub connect_url: String,
    /// Seconds between background refreshes. 0 disables polling.
    pub poll_interval_secs: u64,
    pub account_limit: usize,
    pub request_timeout_secs: u64,
    pub credential_store: CredentialBackend,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            connect_url: DEFAULT_CONNECT_URL.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            account_limit: DEFAULT_ACCOUNT_LIMIT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_store: CredentialBackend::default(),
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the session file and logs.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Blank values are ignored, as is
    /// a poll interval that does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = value(ENV_API_URL) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(url) = value(ENV_CONNECT_URL) {
            self.connect_url = url.trim().to_string();
        }
        if let Some(secs) = value(ENV_POLL_SECS) {
            match secs.trim().parse() {
                Ok(secs) => self.poll_interval_secs = secs,
                Err(_) => tracing::warn!(value = %secs, "Ignoring invalid {}", ENV_POLL_SECS),
            }
        }
    }

    /// Polling interval, or `None` when polling is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        match self.poll_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Credential store selected by `credential_store`.
    pub fn token_storage(&self) -> Result<Box<dyn TokenStorage>> {
        Ok(match self.credential_store {
            CredentialBackend::File => {
                let storage = FileTokenStorage::new(Self::data_dir()?);
                debug!(path = %storage.path().display(), "Using file credential store");
                Box::new(storage)
            }
            CredentialBackend::Keyring => {
                debug!("Using keychain credential store");
                Box::new(KeyringTokenStorage::new())
            }
        })
    }
}
