use dotenv::dotenv;
use std::env;
use std::time::Duration;

use crate::client::ClientSettings;

/// Settings read from `EASYTCP_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: String,
    pub reply_timeout_ms: u64,
    pub max_pending: usize,
    pub compression: bool,
    pub connect_timeout_seconds: u64,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

fn default_addr() -> String {
    "127.0.0.1:7878".to_string()
}

fn default_reply_timeout_ms() -> u64 {
    5000
}

fn default_max_pending() -> usize {
    1
}

fn default_connect_timeout_seconds() -> u64 {
    10
}

fn default_reconnect_attempts() -> u32 {
    10
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: default_addr(),
            reply_timeout_ms: default_reply_timeout_ms(),
            max_pending: default_max_pending(),
            compression: false,
            connect_timeout_seconds: default_connect_timeout_seconds(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and the process environment. Unset
    /// variables take their defaults; malformed ones are errors.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            addr: lookup("EASYTCP_ADDR").unwrap_or_else(default_addr),
            reply_timeout_ms: match lookup("EASYTCP_REPLY_TIMEOUT_MS") {
                Some(val) => val.parse()?,
                None => default_reply_timeout_ms(),
            },
            max_pending: match lookup("EASYTCP_MAX_PENDING") {
                Some(val) => val.parse()?,
                None => default_max_pending(),
            },
            compression: match lookup("EASYTCP_COMPRESSION") {
                Some(val) => parse_flag(&val)?,
                None => false,
            },
            connect_timeout_seconds: match lookup("EASYTCP_CONNECT_TIMEOUT_SECONDS") {
                Some(val) => val.parse()?,
                None => default_connect_timeout_seconds(),
            },
            reconnect_attempts: match lookup("EASYTCP_RECONNECT_ATTEMPTS") {
                Some(val) => val.parse()?,
                None => default_reconnect_attempts(),
            },
            reconnect_delay_ms: match lookup("EASYTCP_RECONNECT_DELAY_MS") {
                Some(val) => val.parse()?,
                None => default_reconnect_delay_ms(),
            },
        })
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            addr: self.addr.clone(),
            reply_timeout: self.reply_timeout(),
            max_pending: self.max_pending,
            compression: self.compression,
            connect_timeout: self.connect_timeout(),
            reconnect_attempts: self.reconnect_attempts,
            reconnect_delay_ms: self.reconnect_delay_ms,
        }
    }
}

fn parse_flag(val: &str) -> Result<bool, String> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("Invalid boolean value: {}", other)),
    }
}
