//! setting config file
//! layered: built-in defaults, then `config_{ENV}.toml` if present, then `PANEL__*` env vars

use std::env;
use std::time::Duration;
use config::{Config, ConfigError, Environment, File};
use lazy_static::lazy_static;
use serde_derive::Deserialize;

use crate::entity::bo::target_bo::ConnectionTarget;

/// fallback device address used when nothing else is known or reachable
pub const DEFAULT_ADDRESS: &str = "192.168.88.254";
/// standard modbus tcp port
pub const DEFAULT_PORT: u16 = 502;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Env {
    pub env: String,
    pub log_level: String,
    /// "real" talks to the device over tcp, "dummy" simulates one in memory
    pub mode: String,
}

impl Default for Env {
    fn default() -> Self {
        Env {
            env: String::from("dev"),
            log_level: String::from("info"),
            mode: String::from("real"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Device {
    pub default_address: String,
    pub default_port: u16,
    pub unit_id: u8,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for Device {
    fn default() -> Self {
        Device {
            default_address: String::from(DEFAULT_ADDRESS),
            default_port: DEFAULT_PORT,
            unit_id: 1,
            connect_timeout_ms: 3000,
            request_timeout_ms: 1000,
        }
    }
}

impl Device {
    pub fn default_target(&self) -> ConnectionTarget {
        ConnectionTarget::new(self.default_address.as_str(), self.default_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WriteBack {
    pub interval_ms: u64,
    /// consecutive failed ticks before the streak is escalated to error level
    pub failure_report_threshold: u32,
}

impl Default for WriteBack {
    fn default() -> Self {
        WriteBack {
            interval_ms: 400,
            failure_report_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct State {
    pub file_path: String,
}

impl Default for State {
    fn default() -> Self {
        State {
            file_path: String::from("last_state.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub env: Env,
    pub device: Device,
    pub write_back: WriteBack,
    pub state: State,
}

impl Settings {
    pub fn get<'a>() -> &'a Self {
        lazy_static! {
            static ref CACHE: Settings = Settings::load().unwrap_or_else(|e| {
                eprintln!("settings cannot be loaded, using built-in defaults: {}", e);
                Settings::default()
            });
        }
        &CACHE
    }

    /// build settings from the config file for the current ENV and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let env_name = env::var("ENV").unwrap_or_else(|_| String::from("dev"));
        Self::load_from(format!("config_{}", env_name).as_str())
    }

    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(file_stem).required(false))
            .add_source(
                Environment::with_prefix("PANEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
