//! Daemon configuration.
//!
//! Values are layered, lowest precedence first:
//! 1. Built-in defaults
//! 2. Optional TOML file (`$ODBRIDGE_CONFIG`, else
//!    `<config dir>/odbridge/config.toml`)
//! 3. The `--nats` command-line flag
//!
//! ```toml
//! bus_address = "nats://10.0.0.5:4222"
//! log_level = "debug"
//! publish_interval_ms = 1000
//! ```
//!
//! A missing file is the same as an empty one. A file that exists but
//! cannot be read or parsed is an error.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::bridge::PUBLISH_INTERVAL;

/// Bus server used when nothing else is configured.
pub const DEFAULT_BUS_ADDRESS: &str = "nats://127.0.0.1:4222";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "ODBRIDGE_CONFIG";

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Log verbosity applied to the daemon's crates when `RUST_LOG` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for one run of the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Bus server to connect to
    pub bus_address: String,
    pub log_level: LogLevel,
    /// Time between telemetry sweeps
    pub publish_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bus_address: DEFAULT_BUS_ADDRESS.to_string(),
            log_level: LogLevel::default(),
            publish_interval: PUBLISH_INTERVAL,
        }
    }
}

/// On-disk form. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    bus_address: Option<String>,
    log_level: Option<LogLevel>,
    publish_interval_ms: Option<u64>,
}

impl BridgeConfig {
    /// Path of the configuration file, if one can be determined.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("odbridge").join("config.toml"))
    }

    /// Loads configuration from the default file location, then applies
    /// the command-line bus address if one was given.
    pub fn load(bus_address: Option<&str>) -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path().as_deref(), bus_address)
    }

    /// Same as [`BridgeConfig::load`] with an explicit file path.
    pub fn load_from(path: Option<&Path>, bus_address: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(file) = path.map(read_config_file).transpose()?.flatten() {
            config.merge(file);
        }

        if let Some(address) = bus_address {
            config.bus_address = address.to_string();
        }

        config.validate()?;
        Ok(config)
    }

    fn merge(&mut self, file: ConfigFile) {
        if let Some(address) = file.bus_address {
            self.bus_address = address;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        if let Some(ms) = file.publish_interval_ms {
            self.publish_interval = Duration::from_millis(ms);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bus_address.trim().is_empty() {
            return Err(ConfigError::Invalid("bus_address is empty".to_string()));
        }
        if self.publish_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "publish_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(None);
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };

    let file = toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    debug!(path = %path.display(), "Loaded config file");
    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::load_from(None, None).unwrap();
        assert_eq!(config.bus_address, "nats://127.0.0.1:4222");
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.publish_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = BridgeConfig::load_from(Some(&path), None).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_file_values_apply() {
        let file = write_config(
            "bus_address = \"nats://10.0.0.5:4222\"\nlog_level = \"debug\"\npublish_interval_ms = 250\n",
        );
        let config = BridgeConfig::load_from(Some(file.path()), None).unwrap();
        assert_eq!(config.bus_address, "nats://10.0.0.5:4222");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.publish_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_flag_overrides_file() {
        let file = write_config("bus_address = \"nats://10.0.0.5:4222\"\n");
        let config =
            BridgeConfig::load_from(Some(file.path()), Some("nats://robot.local:4222")).unwrap();
        assert_eq!(config.bus_address, "nats://robot.local:4222");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let file = write_config("bus_address = [");
        let err = BridgeConfig::load_from(Some(file.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_key_is_error() {
        let file = write_config("bus_adress = \"nats://typo:4222\"\n");
        assert!(BridgeConfig::load_from(Some(file.path()), None).is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let file = write_config("publish_interval_ms = 0\n");
        let err = BridgeConfig::load_from(Some(file.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::default().as_str(), "info");
    }
}
