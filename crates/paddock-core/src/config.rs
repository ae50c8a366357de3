//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! covers the backend base URL and the preferred credential backend.
//!
//! Configuration is stored at `~/.config/paddock/config.json`. The
//! `PADDOCK_API_URL` environment variable beats the file, which beats the
//! built-in production address.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for the config directory path
const APP_NAME: &str = "paddock";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the backend address
const BASE_URL_ENV: &str = "PADDOCK_API_URL";

/// Production backend
const DEFAULT_BASE_URL: &str = "https://api.paddock.racing";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub base_url: Option<String>,
    /// `"keyring"` (default) or `"file"`
    pub credential_backend: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
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

    /// Backend address after applying the override chain
    pub fn api_base_url(&self) -> String {
        resolve_base_url(std::env::var(BASE_URL_ENV).ok(), self.base_url.as_deref())
    }

    /// True when the config asks for the file-backed credential store
    /// instead of the OS keychain
    pub fn use_file_store(&self) -> bool {
        matches!(self.credential_backend.as_deref(), Some("file"))
    }
}

fn resolve_base_url(env_value: Option<String>, configured: Option<&str>) -> String {
    env_value
        .filter(|v| !v.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}
