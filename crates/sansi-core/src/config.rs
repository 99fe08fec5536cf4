//! Client configuration management.
//!
//! This module handles loading and saving the client configuration: where
//! the backend lives, request timing, and where the session is kept.
//!
//! Configuration is stored at `~/.config/oh-sansi/config.json`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_TIMEOUT_MS;
use crate::auth::{
    CredentialStore, FileStorage, KeyringStorage, MemoryStorage, DEFAULT_LEEWAY_SECS,
    DEFAULT_TOKEN_LIFETIME_SECS,
};

/// Application name used for config/data directory paths
const APP_NAME: &str = "oh-sansi";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

const DEFAULT_API_ROOT: &str = "http://localhost:8000";

/// Where the session is persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "keyring" => Ok(StorageKind::Keyring),
            "memory" => Ok(StorageKind::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown session storage '{}' (expected file, keyring or memory)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend root; requests go to `<api_root>/api/...`
    pub api_root: String,
    pub request_timeout_ms: u64,
    pub expiry_leeway_secs: i64,
    /// Lifetime assumed for tokens without a readable expiry
    pub token_lifetime_secs: i64,
    pub storage: StorageKind,
    /// Overrides the default session file location
    pub session_file: Option<PathBuf>,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            expiry_leeway_secs: DEFAULT_LEEWAY_SECS,
            token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            storage: StorageKind::default(),
            session_file: None,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
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

    pub fn session_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.session_file {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(SESSION_FILE))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Open the credential store on the configured storage backend.
    pub fn open_store(&self) -> Result<CredentialStore> {
        let store = match self.storage {
            StorageKind::File => CredentialStore::new(FileStorage::new(self.session_path()?)),
            StorageKind::Keyring => CredentialStore::new(KeyringStorage::default()),
            StorageKind::Memory => CredentialStore::new(MemoryStorage::new()),
        };
        Ok(store
            .with_leeway(self.expiry_leeway_secs)
            .with_token_lifetime(self.token_lifetime_secs))
    }
}
