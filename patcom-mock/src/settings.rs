use std::error::Error;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::{env, fs, io};

use serde::{Deserialize, Serialize};

/// Environment variable naming a settings file that replaces the built-in defaults
pub const CONFIG_ENV: &str = "PATCOM_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mock {
    /// File holding the simulated flash
    pub storage_path: String,
    pub hardware_id: u64,
    pub bind: Ipv4Addr,
    pub discovery_port: u16,
    pub config_port: u16,
    /// Volts reported as the battery level
    pub supply_voltage: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub mock: Mock,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let mut settings: Settings = match env::var(CONFIG_ENV) {
            Ok(path) => toml::from_str(&fs::read_to_string(path)?)?,
            Err(_) => toml::from_str(include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../",
                "configs/default.toml"
            )))?,
        };

        settings.mock.storage_path = Self::normalize_path(&settings.mock.storage_path)?
            .to_string_lossy()
            .to_string();

        Ok(settings)
    }

    fn normalize_path(path: &str) -> io::Result<PathBuf> {
        let path_buf = PathBuf::from(path);

        Ok(if path_buf.is_absolute() {
            path_buf.clone()
        } else {
            env::current_dir()?.as_path().join(&path_buf)
        })
    }
}
