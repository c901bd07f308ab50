//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: backend
//! location, timeouts, the renewal timer period, OAuth2 client fields and
//! where the session is kept.
//!
//! Configuration is stored at `~/.config/brainctl/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileStorage, KeyringStorage, LoginCredentials, MemoryStorage, SessionStorage};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "brainctl";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Slow provisioning calls (disk rebuilds) can take close to two minutes.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const DEFAULT_RENEWAL_CHECK_INTERVAL_SECS: u64 = 5 * 60;

/// Where the session record lives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub renewal_check_interval_secs: u64,
    pub last_username: Option<String>,
    /// Keep renewing in the background ("remember me")
    pub remember: bool,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub storage: StorageBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            renewal_check_interval_secs: DEFAULT_RENEWAL_CHECK_INTERVAL_SECS,
            last_username: None,
            remember: true,
            scope: None,
            client_id: None,
            client_secret: None,
            storage: StorageBackend::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path).context("Failed to read config file")?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn renewal_check_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_check_interval_secs.max(1))
    }

    /// Password-grant credentials carrying the configured client fields.
    pub fn credentials(&self, username: &str, password: &str) -> LoginCredentials {
        LoginCredentials {
            scope: self.scope.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            ..LoginCredentials::new(username, password)
        }
    }

    pub fn session_storage(&self) -> Result<Box<dyn SessionStorage>> {
        Ok(match self.storage {
            StorageBackend::File => Box::new(FileStorage::new(self.cache_dir()?)),
            StorageBackend::Keyring => Box::new(KeyringStorage::default()),
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
        })
    }
}
