//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{JetiExError, Result};
use crate::ex::protocol::{DEFAULT_DEVICE_ID, MAX_NAME_LEN};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial adapter configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Without a port the link runs against a null wire
    #[serde(default = "default_serial_enabled")]
    pub enabled: bool,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// EX protocol configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProtocolConfig {
    /// Device name announced in the name frame
    #[serde(default = "default_device_name")]
    pub name: String,

    #[serde(default = "default_device_id")]
    pub device_id: u16,

    #[serde(default = "default_send_cycle_ms")]
    pub send_cycle_ms: u64,

    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,
}

/// Frame capture configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_capture_enabled")]
    pub enabled: bool,

    #[serde(default = "default_capture_dir")]
    pub dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily rolling log files go here when set
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_serial_enabled() -> bool { false }
fn default_baud_rate() -> u32 { 9600 }
fn default_read_timeout_ms() -> u64 { 10 }

fn default_device_name() -> String { "JetiEx Uplink".to_string() }
fn default_device_id() -> u16 { DEFAULT_DEVICE_ID }
fn default_send_cycle_ms() -> u64 { 150 }
fn default_warmup_ms() -> u64 { 2000 }

fn default_capture_enabled() -> bool { false }
fn default_capture_dir() -> String { "./captures".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            enabled: default_serial_enabled(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            device_id: default_device_id(),
            send_cycle_ms: default_send_cycle_ms(),
            warmup_ms: default_warmup_ms(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: default_capture_enabled(),
            dir: default_capture_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl ProtocolConfig {
    pub fn send_cycle(&self) -> Duration {
        Duration::from_millis(self.send_cycle_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn invalid(message: impl std::fmt::Display) -> JetiExError {
    JetiExError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use jetiex_uplink::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Serial
        if self.serial.enabled && self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty when enabled"));
        }

        if ![9600, 9800, 19200].contains(&self.serial.baud_rate) {
            return Err(invalid("baud_rate must be one of: 9600, 9800, 19200"));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 1000 {
            return Err(invalid("read_timeout_ms must be between 1 and 1000"));
        }

        // Protocol
        let name_len = self.protocol.name.len();
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return Err(invalid(format!(
                "device name must be 1 to {} characters",
                MAX_NAME_LEN
            )));
        }

        if !self.protocol.name.is_ascii() {
            return Err(invalid("device name must be ASCII"));
        }

        if self.protocol.send_cycle_ms < 75 || self.protocol.send_cycle_ms > 60000 {
            return Err(invalid("send_cycle_ms must be between 75 and 60000"));
        }

        if self.protocol.warmup_ms > 10000 {
            return Err(invalid("warmup_ms must be between 0 and 10000"));
        }

        // Capture
        if self.capture.enabled && self.capture.dir.is_empty() {
            return Err(invalid("capture dir cannot be empty when enabled"));
        }

        if self.capture.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.capture.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        // Logging
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.protocol.send_cycle(), Duration::from_millis(150));
        assert_eq!(config.protocol.warmup(), Duration::from_secs(2));
        assert_eq!(config.serial.read_timeout(), Duration::from_millis(10));
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyUSB1"
enabled = true
baud_rate = 9800

[protocol]
name = "Vario"
device_id = 0x3277
send_cycle_ms = 100

[capture]
enabled = true
dir = "/tmp/ex"

[logging]
level = "debug"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.baud_rate, 9800);
        assert_eq!(config.protocol.name, "Vario");
        assert_eq!(config.protocol.device_id, 0x3277);
        assert_eq!(config.protocol.warmup_ms, 2000);
        assert!(config.capture.enabled);
        assert_eq!(config.capture.max_files_to_keep, 10);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.dir, None);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.serial.baud_rate, 9600);
        assert!(!config.serial.enabled);
        assert_eq!(config.protocol.device_id, DEFAULT_DEVICE_ID);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/jetiex/config.toml");
        assert!(matches!(result, Err(JetiExError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::parse("[serial\nport = 1");
        assert!(matches!(result, Err(JetiExError::Config(_))));
    }

    #[test]
    fn test_empty_serial_port_when_enabled() {
        let mut config = create_valid_config();
        config.serial.enabled = true;
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_serial_port_when_disabled() {
        let mut config = create_valid_config();
        config.serial.port = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.serial.baud_rate = 115200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &rate in &[9600, 9800, 19200] {
            let mut config = create_valid_config();
            config.serial.baud_rate = rate;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", rate);
        }
    }

    #[test]
    fn test_read_timeout_zero() {
        let mut config = create_valid_config();
        config.serial.read_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_timeout_too_high() {
        let mut config = create_valid_config();
        config.serial.read_timeout_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_device_name() {
        let mut config = create_valid_config();
        config.protocol.name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_device_name_too_long() {
        let mut config = create_valid_config();
        config.protocol.name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(config.validate().is_err());

        config.protocol.name = "x".repeat(MAX_NAME_LEN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_device_name_not_ascii() {
        let mut config = create_valid_config();
        config.protocol.name = "Höhe".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_send_cycle_below_minimum() {
        let mut config = create_valid_config();
        config.protocol.send_cycle_ms = 74;
        assert!(config.validate().is_err());

        config.protocol.send_cycle_ms = 75;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_send_cycle_too_high() {
        let mut config = create_valid_config();
        config.protocol.send_cycle_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_warmup_bounds() {
        let mut config = create_valid_config();
        config.protocol.warmup_ms = 0;
        assert!(config.validate().is_ok());

        config.protocol.warmup_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_capture_dir_when_enabled() {
        let mut config = create_valid_config();
        config.capture.enabled = true;
        config.capture.dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = create_valid_config();
        config.capture.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = create_valid_config();
        config.capture.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = create_valid_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/ttyUSB0");
        assert_eq!(default_serial_enabled(), false);
        assert_eq!(default_baud_rate(), 9600);
        assert_eq!(default_read_timeout_ms(), 10);
        assert_eq!(default_device_name(), "JetiEx Uplink");
        assert_eq!(default_device_id(), 0x3276);
        assert_eq!(default_send_cycle_ms(), 150);
        assert_eq!(default_warmup_ms(), 2000);
        assert_eq!(default_capture_enabled(), false);
        assert_eq!(default_capture_dir(), "./captures");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
        assert_eq!(default_log_level(), "info");
    }
}
