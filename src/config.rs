// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::client::ClientSettings;

pub const CONFIG_FILE_NAME: &str = "EasyTcp.json";

// Configuration structures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EasyTcpConfig {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub requests: RequestSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub addr: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSettings {
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_ms: u64,
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    #[serde(default)]
    pub compression: bool,
}

impl Default for RequestSettings {
    fn default() -> Self {
        RequestSettings {
            reply_timeout_ms: default_reply_timeout(),
            max_pending: default_max_pending(),
            compression: false,
        }
    }
}

// Default values
fn default_connect_timeout() -> u64 { 10_000 }
fn default_reconnect_attempts() -> u32 { 10 }
fn default_reconnect_delay() -> u64 { 1000 }
fn default_reply_timeout() -> u64 { 5000 }
fn default_max_pending() -> usize { 1 }

impl EasyTcpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connection.addr.trim().is_empty() {
            return Err(anyhow!("Configuration error: connection.addr cannot be empty"));
        }
        if self.requests.max_pending == 0 {
            return Err(anyhow!("Configuration error: requests.max_pending must be at least 1"));
        }
        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            addr: self.connection.addr.clone(),
            reply_timeout: Duration::from_millis(self.requests.reply_timeout_ms),
            max_pending: self.requests.max_pending,
            compression: self.requests.compression,
            connect_timeout: Duration::from_millis(self.connection.connect_timeout_ms),
            reconnect_attempts: self.connection.reconnect_attempts,
            reconnect_delay_ms: self.connection.reconnect_delay_ms,
        }
    }
}

/// Looks for the config file in `base`, then `base/config`, then the user's
/// home directory (as a dot file).
pub fn find_config_file_in(base: &Path) -> Result<PathBuf> {
    let locations = [
        ("Current directory", base.join(CONFIG_FILE_NAME)),
        ("Current directory (alternative)", base.join("config").join(CONFIG_FILE_NAME)),
    ];

    for (location_name, path) in locations.iter() {
        if path.exists() {
            debug!("Found config file in {}: {}", location_name, path.display());
            return Ok(path.clone());
        }
    }

    if let Some(home_dir) = home::home_dir() {
        let home_config = home_dir.join(format!(".{}", CONFIG_FILE_NAME));
        if home_config.exists() {
            debug!("Found config file in home directory: {}", home_config.display());
            return Ok(home_config);
        }
    }

    Err(anyhow!(
        "Could not find {} configuration file. \
         Please create one in the current directory, its config/ subdirectory, \
         or your home directory.",
        CONFIG_FILE_NAME
    ))
}

pub fn find_config_file() -> Result<PathBuf> {
    find_config_file_in(Path::new("."))
}

pub fn load_config_from(path: &Path) -> Result<EasyTcpConfig> {
    let config_content = fs::read_to_string(path)
        .context(format!("Failed to read config file at {}", path.display()))?;

    let config: EasyTcpConfig = serde_json::from_str(&config_content)
        .context("Configuration file contains invalid JSON or missing required fields")?;

    config.validate()?;
    Ok(config)
}

pub fn load_config() -> Result<EasyTcpConfig> {
    let config_path = find_config_file()?;
    load_config_from(&config_path)
}

pub fn create_default_config_file(path: &Path) -> Result<()> {
    let default_config = EasyTcpConfig {
        connection: ConnectionConfig {
            addr: "127.0.0.1:7878".to_string(),
            connect_timeout_ms: default_connect_timeout(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay(),
        },
        requests: RequestSettings::default(),
    };

    let json = serde_json::to_string_pretty(&default_config)
        .context("Failed to serialize default configuration")?;

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory at {}", parent.display()))?;
        }
    }

    fs::write(path, json)
        .context(format!("Failed to write configuration to {}", path.display()))?;

    info!("Created default configuration file at: {}", path.display());
    Ok(())
}
