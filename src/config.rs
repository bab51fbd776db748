//! Loading and validating the hub's startup configuration.

use std::fmt::Display;
use std::io::Read;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Which concrete `I2cBus`/`SerialLink` pair to construct.
pub enum BackendKind {
    /// Real Linux I2C char device + real serial port.
    Linux,
    /// In-process loopback, used for local testing and simulation without hardware attached.
    Loopback,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Startup configuration for the hub. This is never used to seed a sensor roster: the roster is
/// always empty at boot and built up entirely through `ADD_SENSOR` commands.
pub struct HubConfig {
    /// This board's identifier, checked against every incoming command frame.
    pub board_id: u8,
    /// Which backend to construct.
    pub backend: BackendKind,
    /// Path to the I2C device node (only meaningful for `BackendKind::Linux`).
    pub i2c_path: Option<String>,
    /// Path to the serial device node (only meaningful for `BackendKind::Linux`).
    pub serial_path: Option<String>,
    /// Serial baud rate (only meaningful for `BackendKind::Linux`).
    pub baud_rate: u32,
    /// Where to mirror console log output. If omitted, only stdout is written to.
    pub log_path: Option<String>,
}

#[derive(Debug)]
/// Errors that can occur while loading a `HubConfig`.
pub enum ConfigError {
    /// The configuration could not be parsed as JSON into a `HubConfig`.
    Malformed(serde_json::Error),
    /// `board_id` was the reserved sentinel `0x00`.
    BadBoardId,
    /// `backend` was `Linux` but the device paths needed to open it were not given.
    MissingBackendPaths,
    /// `baud_rate` was zero.
    BadBaudRate,
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Malformed(e)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Malformed(e) => write!(f, "failed to parse configuration JSON: {e}"),
            ConfigError::BadBoardId => write!(f, "board_id 0x00 is reserved and cannot be used"),
            ConfigError::MissingBackendPaths => write!(
                f,
                "backend \"linux\" requires both i2c_path and serial_path to be set"
            ),
            ConfigError::BadBaudRate => write!(f, "baud_rate must be nonzero"),
        }
    }
}

impl HubConfig {
    /// Construct a new `HubConfig` by parsing some readable JSON source, then validating it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the JSON is malformed or the configuration is internally
    /// inconsistent.
    pub fn parse(source: &mut impl Read) -> Result<HubConfig, ConfigError> {
        let config: HubConfig = serde_json::from_reader(source)?;

        if config.board_id == 0 {
            return Err(ConfigError::BadBoardId);
        }
        if config.backend == BackendKind::Linux
            && (config.i2c_path.is_none() || config.serial_path.is_none())
        {
            return Err(ConfigError::MissingBackendPaths);
        }
        if config.baud_rate == 0 {
            return Err(ConfigError::BadBaudRate);
        }

        Ok(config)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            board_id: crate::protocol::DEFAULT_BOARD_ID,
            backend: BackendKind::Loopback,
            i2c_path: None,
            serial_path: None,
            baud_rate: 115_200,
            log_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn parses_loopback_config() {
        let config_str = r#"{
            "board_id": 1,
            "backend": "loopback",
            "i2c_path": null,
            "serial_path": null,
            "baud_rate": 115200,
            "log_path": null
        }"#;
        let mut cursor = Cursor::new(config_str);
        let config = HubConfig::parse(&mut cursor).unwrap();
        assert_eq!(config.board_id, 1);
        assert_eq!(config.backend, BackendKind::Loopback);
    }

    #[test]
    fn linux_backend_requires_paths() {
        let config_str = r#"{
            "board_id": 1,
            "backend": "linux",
            "i2c_path": null,
            "serial_path": null,
            "baud_rate": 115200,
            "log_path": null
        }"#;
        let mut cursor = Cursor::new(config_str);
        assert!(matches!(
            HubConfig::parse(&mut cursor),
            Err(ConfigError::MissingBackendPaths)
        ));
    }

    #[test]
    fn zero_baud_rate_rejected() {
        let config_str = r#"{
            "board_id": 1,
            "backend": "loopback",
            "i2c_path": null,
            "serial_path": null,
            "baud_rate": 0,
            "log_path": null
        }"#;
        let mut cursor = Cursor::new(config_str);
        assert!(matches!(
            HubConfig::parse(&mut cursor),
            Err(ConfigError::BadBaudRate)
        ));
    }

    #[test]
    fn reserved_board_id_rejected() {
        let config_str = r#"{
            "board_id": 0,
            "backend": "loopback",
            "i2c_path": null,
            "serial_path": null,
            "baud_rate": 115200,
            "log_path": null
        }"#;
        let mut cursor = Cursor::new(config_str);
        assert!(matches!(
            HubConfig::parse(&mut cursor),
            Err(ConfigError::BadBoardId)
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        let mut cursor = Cursor::new("{ not json");
        assert!(matches!(
            HubConfig::parse(&mut cursor),
            Err(ConfigError::Malformed(_))
        ));
    }
}
