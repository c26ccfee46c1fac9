use std::env;
use std::fs;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable naming a settings file that replaces the built-in defaults
pub const CONFIG_ENV: &str = "PATCOM_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    pub port: u16,
    pub broadcast: Ipv4Addr,
    pub response_window_ms: u64,
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Discovery {
    pub fn response_window(&self) -> Duration {
        Duration::from_millis(self.response_window_ms)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sync {
    pub port: u16,
    pub timeout_ms: u64,
    pub max_payload: usize,
}

impl Sync {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Serial {
    /// First available port when unset
    pub port_path: Option<String>,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub discovery: Discovery,
    pub sync: Sync,
    pub serial: Option<Serial>,
}

impl Settings {
    pub fn new() -> Result<Self> {
        match env::var(CONFIG_ENV) {
            Ok(path) => {
                let text = fs::read_to_string(&path)
                    .map_err(|e| Error::config(format!("Failed to read {}: {}", path, e)))?;
                Self::from_toml(&text)
            }
            Err(_) => Self::from_toml(include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../",
                "configs/default.toml"
            ))),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_parse() {
        let settings = Settings::from_toml(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../",
            "configs/default.toml"
        )))
        .unwrap();

        assert_eq!(settings.discovery.port, patcom_api::DISCOVERY_PORT);
        assert_eq!(settings.sync.port, patcom_api::CONFIG_PORT);
        assert_eq!(settings.discovery.ttl(), Duration::from_secs(120));
        assert_eq!(settings.sync.timeout(), Duration::from_secs(3));
        assert!(settings.serial.is_none());
    }

    #[test]
    fn test_invalid_settings_reported() {
        let err = Settings::from_toml("[logger]\nlevel = 3").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
