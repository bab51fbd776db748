//! The plug-in sensor driver interface.
//!
//! A driver is identified by a `type_code`; `DriverInfo` knows how to construct a fresh
//! `Box<dyn Driver>` for a given I2C address. This replaces the opaque-context, function-pointer
//! v-table of the original firmware (`ctx_size` + `init_ctx` + `get_driver`) with a single
//! constructor returning an owned trait object: there is no separate "context" distinct from the
//! driver, so there is nothing left for a size or an initializer to describe.

use std::fmt::Display;

use crate::bus::{BusError, I2cBus};

#[derive(Debug)]
/// Errors raised from inside a `Driver` implementation.
pub enum DriverError {
    /// The underlying bus transaction failed.
    Bus(BusError),
    /// A `configure`/`read_config_bytes` call referenced a field id this driver doesn't know.
    BadField(u8),
}

impl Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverError::Bus(e) => write!(f, "bus error: {e}"),
            DriverError::BadField(id) => write!(f, "unknown field id {id}"),
        }
    }
}

impl From<BusError> for DriverError {
    fn from(e: BusError) -> Self {
        DriverError::Bus(e)
    }
}

/// The per-sensor v-table. One boxed instance is owned exclusively by its `SensorTask`, shared
/// with the manager/dispatcher only through an `Arc<Mutex<Box<dyn Driver>>>` so that `configure`
/// and `read` cannot interleave.
pub trait Driver: Send {
    /// Perform whatever one-time setup this driver needs (e.g. calibration register writes).
    /// Called exactly once, as the very first action of the sensor's task, while holding the bus
    /// mutex.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` if the initializing bus transaction fails.
    fn init(&mut self, bus: &dyn I2cBus) -> Result<(), DriverError>;

    /// Perform one measurement and return it as a byte payload.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` if the bus transaction fails.
    fn read(&mut self, bus: &dyn I2cBus) -> Result<Vec<u8>, DriverError>;

    /// Current payload size in bytes, which may depend on runtime state such as a payload mask.
    fn sample_size(&self) -> u8;

    /// Apply a `SET_*` opcode's parameter to this driver's configuration.
    ///
    /// Returns `false` if `field_id` is not one this driver recognizes.
    fn configure(&mut self, bus: &dyn I2cBus, field_id: u8, param: u8) -> Result<bool, DriverError>;

    /// Encode the current value of a `GET_*` field as 1-4 bytes, or `None` if `field_id` is not
    /// recognized.
    fn read_config_bytes(&self, field_id: u8) -> Option<Vec<u8>>;

    /// The set of `SET_*`/`GET_*` field ids this driver answers, used to build the `GET_CONFIG`
    /// response.
    fn field_ids(&self) -> &[u8];
}

/// Static, immutable description of a sensor type, registered once at startup.
pub struct DriverInfo {
    /// One-byte identifier for this sensor type, as carried in `ADD_SENSOR`'s parameter and in
    /// `LIST_SENSORS` responses.
    pub type_code: u8,
    /// Construct a fresh driver instance bound to `addr7`.
    pub make: fn(addr7: u8) -> Box<dyn Driver>,
    /// Polling period to use when a sensor of this type is added without an explicit period.
    pub default_period_ms: u32,
}
