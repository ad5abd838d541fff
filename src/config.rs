//! Gateway configuration.
//!
//! [`GatewayConfig`] is the user-facing part, deserialized from JSON with
//! defaults for everything except the gateway host. [`Timing`] holds the
//! bus timing constants; it is not part of the JSON and is only changed
//! through [`WallpadBuilder`](crate::WallpadBuilder), mostly by tests.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceKey, DeviceOptions, FanPreset, UpdatePolicy, MAX_LIGHT_CHANNELS};
use crate::error::{Result, WallpadError};
use crate::protocol::Room;

/// Default gateway TCP port.
pub const DEFAULT_PORT: u16 = 8899;
/// Default polling interval; also the cache staleness window.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(300);

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_floor() -> u8 {
    15
}

fn default_light_count() -> u8 {
    2
}

fn default_init_temp() -> u8 {
    20
}

fn default_fan_mode() -> FanPreset {
    FanPreset::Medium
}

fn default_polling_secs() -> u64 {
    DEFAULT_POLLING_INTERVAL.as_secs()
}

fn default_devices() -> Vec<DeviceKey> {
    vec![
        DeviceKey::Light,
        DeviceKey::Gas,
        DeviceKey::Fan,
        DeviceKey::Thermostat(Room::Livingroom),
    ]
}

/// Installation settings for one wallpad gateway.
///
/// ```
/// use kocom_wallpad::GatewayConfig;
///
/// let config = GatewayConfig::from_json_str(
///     r#"{ "host": "192.168.0.40", "enabled_devices": ["light", "thermo_bedroom"] }"#,
/// )
/// .unwrap();
/// assert_eq!(config.port, 8899);
/// assert_eq!(config.enabled_devices.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Devices to track and poll.
    #[serde(default = "default_devices")]
    pub enabled_devices: Vec<DeviceKey>,
    /// Floor the building's elevator controller knows this unit by.
    #[serde(default = "default_floor")]
    pub rs485_floor: u8,
    #[serde(default = "default_light_count")]
    pub light_count: u8,
    #[serde(default = "default_init_temp")]
    pub init_temp: u8,
    #[serde(default = "default_fan_mode")]
    pub init_fan_mode: FanPreset,
    #[serde(default)]
    pub update_policy: UpdatePolicy,
    #[serde(default = "default_polling_secs")]
    pub polling_interval_secs: u64,
}

impl GatewayConfig {
    /// Config for `host` with every other setting at its default.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            enabled_devices: default_devices(),
            rs485_floor: default_floor(),
            light_count: default_light_count(),
            init_temp: default_init_temp(),
            init_fan_mode: default_fan_mode(),
            update_policy: UpdatePolicy::default(),
            polling_interval_secs: default_polling_secs(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(WallpadError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(WallpadError::Config("port must be in 1..=65535".to_string()));
        }
        if !(1..=MAX_LIGHT_CHANNELS).contains(&self.light_count) {
            return Err(WallpadError::Config(format!(
                "light_count {} outside 1..={MAX_LIGHT_CHANNELS}",
                self.light_count
            )));
        }
        if !(15..=30).contains(&self.init_temp) {
            return Err(WallpadError::Config(format!(
                "init_temp {} outside 15..=30",
                self.init_temp
            )));
        }
        if !(1..=50).contains(&self.rs485_floor) {
            return Err(WallpadError::Config(format!(
                "rs485_floor {} outside 1..=50",
                self.rs485_floor
            )));
        }
        if self.init_fan_mode == FanPreset::Off {
            return Err(WallpadError::Config(
                "init_fan_mode must be Low, Medium or High".to_string(),
            ));
        }
        if self.polling_interval_secs == 0 {
            return Err(WallpadError::Config(
                "polling_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` to dial.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    pub fn device_options(&self) -> DeviceOptions {
        DeviceOptions {
            light_count: self.light_count,
            init_temp: self.init_temp,
            init_fan_mode: self.init_fan_mode,
        }
    }
}

/// Bus timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Minimum quiet time after the last inbound read before writing.
    pub read_write_gap: Duration,
    /// Wait after each transmit before looking for the reply.
    pub settle_delay: Duration,
    pub connect_timeout: Duration,
    /// Added to the polling interval to form the read timeout.
    pub read_grace: Duration,
    /// Delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Pause after a read failure before the first reconnect attempt.
    pub error_pause: Duration,
}

impl Timing {
    /// Read timeout for a given polling interval.
    pub fn read_timeout(&self, polling_interval: Duration) -> Duration {
        polling_interval + self.read_grace
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            read_write_gap: Duration::from_millis(30),
            settle_delay: Duration::from_millis(1500),
            connect_timeout: Duration::from_secs(10),
            read_grace: Duration::from_secs(15),
            reconnect_delay: Duration::from_secs(10),
            error_pause: Duration::from_secs(5),
        }
    }
}
