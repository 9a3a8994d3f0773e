use clap::ArgMatches;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::modbus::buffer::DEFAULT_BUFFER_SIZE;
use crate::modbus::transaction::{TimeoutPolicy, TransactionSettings};
use crate::utils::error::{ModbusError, ModbusResult};

/// Address of the SMI2 indicator used by the bundled demo.
pub const DEFAULT_SLAVE_ADDRESS: u8 = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Connection settings
    pub serial_port: String,
    pub baud_rate: u32,
    pub parity: ParityConfig,
    pub stop_bits: StopBitsConfig,

    // Transaction settings
    pub timeout_ms: u64,
    pub timeout_policy: TimeoutPolicy,
    pub buffer_size: usize,
    pub verify_slave_address: bool,
    pub trace_frames: bool,

    // Default target for commands that don't name one
    pub slave_address: u8,

    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub address: u8,
    pub device_type: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    None,
    Even,
    Odd,
}

impl fmt::Display for ParityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParityConfig::None => write!(f, "no"),
            ParityConfig::Even => write!(f, "even"),
            ParityConfig::Odd => write!(f, "odd"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBitsConfig {
    One,
    Two,
}

impl fmt::Display for StopBitsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopBitsConfig::One => write!(f, "1"),
            StopBitsConfig::Two => write!(f, "2"),
        }
    }
}

fn default_port() -> String {
    if cfg!(target_os = "windows") {
        "COM1".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: default_port(),
            baud_rate: 19200,
            parity: ParityConfig::None,
            stop_bits: StopBitsConfig::One,

            timeout_ms: 10_000,
            timeout_policy: TimeoutPolicy::PerByte,
            buffer_size: DEFAULT_BUFFER_SIZE,
            verify_slave_address: true,
            trace_frames: true,

            slave_address: DEFAULT_SLAVE_ADDRESS,

            devices: vec![DeviceConfig {
                address: DEFAULT_SLAVE_ADDRESS,
                device_type: "smi2".to_string(),
                name: "SMI2 indicator".to_string(),
                enabled: true,
            }],
        }
    }
}

impl Config {
    /// Starts from `--config` (or defaults) and applies command line overrides.
    pub fn from_matches(matches: &ArgMatches) -> ModbusResult<Self> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(port) = matches.get_one::<String>("port") {
            config.serial_port = port.clone();
        }
        if let Some(baud) = matches.get_one::<u32>("baud") {
            config.baud_rate = *baud;
        }
        if let Some(timeout) = matches.get_one::<u64>("timeout") {
            config.timeout_ms = *timeout;
        }
        if let Some(policy) = matches.get_one::<String>("timeout-policy") {
            config.timeout_policy = match policy.as_str() {
                "per-byte" => TimeoutPolicy::PerByte,
                "transaction" => TimeoutPolicy::Transaction,
                other => {
                    return Err(ModbusError::ConfigError(format!("Unknown timeout policy: {}", other)))
                }
            };
        }
        if let Some(stop_bits) = matches.get_one::<u8>("stop-bits") {
            config.stop_bits = match stop_bits {
                1 => StopBitsConfig::One,
                2 => StopBitsConfig::Two,
                other => {
                    return Err(ModbusError::ConfigError(format!("Unsupported stop bits: {}", other)))
                }
            };
        }
        if matches.get_flag("no-address-check") {
            config.verify_slave_address = false;
        }

        config.validate()?;
        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ModbusResult<Self> {
        let path = path.as_ref();
        info!("📄 Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            ModbusError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ModbusResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> ModbusResult<()> {
        if self.baud_rate == 0 {
            return Err(ModbusError::ConfigError("baud_rate must be positive".to_string()));
        }
        // Room for the largest fixed-size response.
        if self.buffer_size < 8 {
            return Err(ModbusError::ConfigError(format!(
                "buffer_size {} is too small for any response",
                self.buffer_size
            )));
        }
        if self.slave_address == 0 || self.slave_address > crate::modbus::frame::MAX_SLAVE_ADDRESS {
            return Err(ModbusError::InvalidDevice(self.slave_address));
        }
        Ok(())
    }

    pub fn transaction_settings(&self) -> TransactionSettings {
        TransactionSettings {
            byte_timeout: Duration::from_millis(self.timeout_ms),
            timeout_policy: self.timeout_policy,
            verify_slave_address: self.verify_slave_address,
            trace_frames: self.trace_frames,
        }
    }

    pub fn get_enabled_devices(&self) -> Vec<&DeviceConfig> {
        self.devices.iter().filter(|d| d.enabled).collect()
    }

    pub fn get_device_by_address(&self, address: u8) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.address == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_bus_parameters() {
        let config = Config::default();
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.stop_bits, StopBitsConfig::One);
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.buffer_size, 256);
        assert_eq!(config.slave_address, 16);
        assert!(config.validate().is_ok());

        let settings = config.transaction_settings();
        assert_eq!(settings.byte_timeout, Duration::from_secs(10));
        assert_eq!(settings.timeout_policy, TimeoutPolicy::PerByte);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            serial_port = "/dev/ttyS1"
            timeout_policy = "transaction"
            stop_bits = "two"
            "#,
        )
        .unwrap();

        assert_eq!(config.serial_port, "/dev/ttyS1");
        assert_eq!(config.timeout_policy, TimeoutPolicy::Transaction);
        assert_eq!(config.stop_bits, StopBitsConfig::Two);
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.get_enabled_devices().len(), 1);
    }

    #[test]
    fn test_timeout_policy_matches_cli_spelling() {
        let config: Config = toml::from_str("timeout_policy = \"per-byte\"").unwrap();
        assert_eq!(config.timeout_policy, TimeoutPolicy::PerByte);
        assert!(toml::from_str::<Config>("timeout_policy = \"per_byte\"").is_err());

        let written = toml::to_string(&Config::default()).unwrap();
        assert!(written.contains("timeout_policy = \"per-byte\""));
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("modbus_rtu_master_{}.toml", std::process::id()));
        let mut config = Config::default();
        config.baud_rate = 9600;
        config.parity = ParityConfig::Even;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.baud_rate, 9600);
        assert_eq!(loaded.parity, ParityConfig::Even);
        assert_eq!(loaded.get_device_by_address(16).map(|d| d.name.as_str()), Some("SMI2 indicator"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.slave_address = 0;
        assert!(matches!(config.validate(), Err(ModbusError::InvalidDevice(0))));

        let mut config = Config::default();
        config.buffer_size = 4;
        assert!(matches!(config.validate(), Err(ModbusError::ConfigError(_))));

        assert!(matches!(
            toml::from_str::<Config>("baud_rate = \"fast\"").map_err(ModbusError::from),
            Err(ModbusError::ConfigError(_))
        ));
    }
}
