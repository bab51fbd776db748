#![warn(clippy::pedantic)]

//! Firmware-style engine for an I2C sensor-hub node: a command dispatcher and a roster of
//! independently-polled sensors sitting behind a framed serial protocol.

pub mod bus;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod driver;
pub mod frame;
pub mod ina219;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod response;
pub mod sample;
pub mod sensor_task;
pub mod server;

use std::fmt::Display;
use std::io;

#[derive(Debug)]
/// The crate-wide error union, returned by `main` and `server::run`. Every layer's own error type
/// composes into this one through `From`, the same way the teacher's `ControllerError` tied its
/// layers together.
pub enum HubError {
    Config(config::ConfigError),
    Manager(manager::ManagerError),
    Bus(bus::BusError),
    Io(io::Error),
    /// A mutex guarding shared state was poisoned by a panicking thread.
    Poison,
}

impl Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::Config(e) => write!(f, "configuration error: {e}"),
            HubError::Manager(e) => write!(f, "sensor manager error: {e}"),
            HubError::Bus(e) => write!(f, "bus error: {e}"),
            HubError::Io(e) => write!(f, "I/O error: {e}"),
            HubError::Poison => write!(f, "a shared lock was poisoned"),
        }
    }
}

impl std::error::Error for HubError {}

impl From<config::ConfigError> for HubError {
    fn from(e: config::ConfigError) -> Self {
        HubError::Config(e)
    }
}

impl From<manager::ManagerError> for HubError {
    fn from(e: manager::ManagerError) -> Self {
        HubError::Manager(e)
    }
}

impl From<bus::BusError> for HubError {
    fn from(e: bus::BusError) -> Self {
        HubError::Bus(e)
    }
}

impl From<io::Error> for HubError {
    fn from(e: io::Error) -> Self {
        HubError::Io(e)
    }
}
