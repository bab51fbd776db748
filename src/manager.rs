//! The mutable roster of active sensors.
//!
//! Grounded on the original firmware's `sensor_manager.c` (add/remove/configure/list/read over a
//! dense array, renumbering on removal), rewritten so that the bus mutex is taken on *every*
//! path that touches the bus, including `configure` — the original's configure path skipped it,
//! which is the bug this rewrite fixes (see the redesign notes alongside the specification this
//! crate implements).

use std::fmt::Display;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::bus::I2cBus;
use crate::console::HubLog;
use crate::driver::DriverError;
use crate::ina219::PAYLOAD_MASK_FIELD;
use crate::protocol::{DEFAULT_POLL_MS, MAX_SENSORS, PERIOD_UNIT_MS};
use crate::registry::DriverRegistry;
use crate::sample::{Sample, SampleQueue};
use crate::sensor_task::SensorTaskHandle;

#[derive(Debug)]
/// Errors raised by `SensorManager` operations.
pub enum ManagerError {
    /// No sensor is registered at the given address.
    NotFound,
    /// `add` was called with an address that is already in use.
    DuplicateAddress(u8),
    /// The manager is already holding `MAX_SENSORS` entries.
    Full,
    /// `add` referenced a `type_code` with no registered driver.
    NoSuchDriver(u8),
    /// The underlying driver raised an error.
    Driver(DriverError),
}

impl Display for ManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagerError::NotFound => write!(f, "no sensor at that address"),
            ManagerError::DuplicateAddress(a) => write!(f, "address 0x{a:02x} already in use"),
            ManagerError::Full => write!(f, "sensor roster is full"),
            ManagerError::NoSuchDriver(t) => write!(f, "no driver registered for type {t}"),
            ManagerError::Driver(e) => write!(f, "driver error: {e}"),
        }
    }
}

impl From<DriverError> for ManagerError {
    fn from(e: DriverError) -> Self {
        ManagerError::Driver(e)
    }
}

/// One tracked sensor. `sensor_id` is purely an output-shape detail (used to fill `LIST_SENSORS`
/// responses); every public `SensorManager` operation is keyed by `addr7`, never by
/// `sensor_id`, since `sensor_id` is renumbered whenever an earlier entry is removed.
struct SensorEntry {
    type_code: u8,
    addr7: u8,
    period_ms: Arc<AtomicU32>,
    driver: Arc<Mutex<Box<dyn crate::driver::Driver>>>,
    queue: Arc<Mutex<SampleQueue>>,
    task: SensorTaskHandle,
}

/// The roster of active sensors, keyed by 7-bit I2C address.
pub struct SensorManager<W: Write + Send + 'static> {
    bus: Arc<dyn I2cBus>,
    registry: Arc<DriverRegistry>,
    log: Arc<HubLog<W>>,
    epoch: Instant,
    entries: Vec<SensorEntry>,
}

impl<W: Write + Send + 'static> SensorManager<W> {
    #[must_use]
    pub fn new(bus: Arc<dyn I2cBus>, registry: Arc<DriverRegistry>, log: Arc<HubLog<W>>) -> SensorManager<W> {
        SensorManager {
            bus,
            registry,
            log,
            epoch: Instant::now(),
            entries: Vec::new(),
        }
    }

    fn find_index(&self, addr7: u8) -> Option<usize> {
        self.entries.iter().position(|e| e.addr7 == addr7)
    }

    /// Add a new sensor of `type_code` at `addr7`, polling at `period_ms` (or the driver's
    /// default if `period_ms` is `None`).
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::DuplicateAddress` if `addr7` is already tracked,
    /// `ManagerError::Full` if the roster is at capacity, or `ManagerError::NoSuchDriver` if
    /// `type_code` has no registered driver.
    pub fn add(&mut self, type_code: u8, addr7: u8, period_ms: Option<u32>) -> Result<(), ManagerError> {
        if self.find_index(addr7).is_some() {
            return Err(ManagerError::DuplicateAddress(addr7));
        }
        if self.entries.len() >= MAX_SENSORS {
            return Err(ManagerError::Full);
        }
        let info = self
            .registry
            .find(type_code)
            .ok_or(ManagerError::NoSuchDriver(type_code))?;

        let driver = Arc::new(Mutex::new((info.make)(addr7)));
        let queue = Arc::new(Mutex::new(SampleQueue::new()));
        let period = Arc::new(AtomicU32::new(
            period_ms.unwrap_or_else(|| {
                if info.default_period_ms == 0 {
                    DEFAULT_POLL_MS
                } else {
                    info.default_period_ms
                }
            }),
        ));

        let task = SensorTaskHandle::spawn(
            addr7,
            Arc::clone(&self.bus),
            Arc::clone(&driver),
            Arc::clone(&queue),
            Arc::clone(&period),
            Arc::clone(&self.log),
            self.epoch,
        );

        self.entries.push(SensorEntry {
            type_code,
            addr7,
            period_ms: period,
            driver,
            queue,
            task,
        });
        Ok(())
    }

    /// Remove the sensor at `addr7`, joining its worker thread before returning.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NotFound` if no sensor is tracked at `addr7`.
    pub fn remove(&mut self, addr7: u8) -> Result<(), ManagerError> {
        let idx = self.find_index(addr7).ok_or(ManagerError::NotFound)?;
        let entry = self.entries.remove(idx);
        entry.task.stop_and_join();
        Ok(())
    }

    /// Apply a `SET_*`-range field to the driver at `addr7`, under the bus mutex.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NotFound` if no sensor is tracked at `addr7`, or
    /// `ManagerError::Driver` if the driver rejects the field or the bus transaction fails.
    pub fn configure(&self, addr7: u8, field_id: u8, param: u8) -> Result<bool, ManagerError> {
        let idx = self.find_index(addr7).ok_or(ManagerError::NotFound)?;
        let entry = &self.entries[idx];
        let mut guard = entry.driver.lock().map_err(|_| ManagerError::NotFound)?;
        Ok(guard.configure(self.bus.as_ref(), field_id, param)?)
    }

    /// Set the polling period of `addr7` to `period_ms`, taking effect on the sensor's next
    /// cycle.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NotFound` if no sensor is tracked at `addr7`.
    pub fn set_period(&self, addr7: u8, period_ms: u32) -> Result<(), ManagerError> {
        let idx = self.find_index(addr7).ok_or(ManagerError::NotFound)?;
        self.entries[idx].period_ms.store(period_ms, Ordering::SeqCst);
        Ok(())
    }

    /// Set the payload mask of `addr7` (through the driver's reserved mask field) and flush its
    /// queue, since changing the mask changes the meaning of any already-queued sample.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NotFound` if no sensor is tracked at `addr7`.
    pub fn set_payload_mask(&self, addr7: u8, mask: u8) -> Result<(), ManagerError> {
        self.configure(addr7, PAYLOAD_MASK_FIELD, mask)?;
        let idx = self.find_index(addr7).ok_or(ManagerError::NotFound)?;
        self.entries[idx].queue.lock().map_err(|_| ManagerError::NotFound)?.flush();
        Ok(())
    }

    /// Read the current value of a `GET_*`-range field, or a few special cases handled directly
    /// by the manager (`GET_PERIOD`, `GET_PAYLOAD_MASK`).
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NotFound` if no sensor is tracked at `addr7`, or
    /// `ManagerError::Driver(DriverError::BadField)` if the driver doesn't know `field_id`.
    pub fn get_config_bytes(&self, addr7: u8, field_id: u8) -> Result<Vec<u8>, ManagerError> {
        use crate::protocol::opcode::GET_PERIOD;

        let idx = self.find_index(addr7).ok_or(ManagerError::NotFound)?;
        let entry = &self.entries[idx];

        if field_id == GET_PERIOD {
            let period = entry.period_ms.load(Ordering::SeqCst) / PERIOD_UNIT_MS;
            return Ok(vec![period as u8]);
        }
        if field_id == crate::protocol::opcode::GET_PAYLOAD_MASK {
            let guard = entry.driver.lock().map_err(|_| ManagerError::NotFound)?;
            return guard
                .read_config_bytes(PAYLOAD_MASK_FIELD)
                .ok_or(ManagerError::Driver(DriverError::BadField(field_id)));
        }

        let guard = entry.driver.lock().map_err(|_| ManagerError::NotFound)?;
        guard
            .read_config_bytes(field_id)
            .ok_or(ManagerError::Driver(DriverError::BadField(field_id)))
    }

    /// Concatenate `read_config_bytes` for every field this sensor's driver enumerates, used to
    /// build the `GET_CONFIG` response.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NotFound` if no sensor is tracked at `addr7`.
    pub fn get_all_config_bytes(&self, addr7: u8) -> Result<Vec<u8>, ManagerError> {
        let idx = self.find_index(addr7).ok_or(ManagerError::NotFound)?;
        let entry = &self.entries[idx];
        let guard = entry.driver.lock().map_err(|_| ManagerError::NotFound)?;
        let mut out = Vec::new();
        for &field_id in guard.field_ids() {
            if let Some(bytes) = guard.read_config_bytes(field_id) {
                out.extend(bytes);
            }
        }
        Ok(out)
    }

    /// Drain up to `max` samples from `addr7`'s queue.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NotFound` if no sensor is tracked at `addr7`.
    pub fn read(&self, addr7: u8, max: usize) -> Result<Vec<Sample>, ManagerError> {
        let idx = self.find_index(addr7).ok_or(ManagerError::NotFound)?;
        let mut out = Vec::new();
        self.entries[idx]
            .queue
            .lock()
            .map_err(|_| ManagerError::NotFound)?
            .drain_into(&mut out, max);
        Ok(out)
    }

    /// Current payload size, in bytes, that `addr7`'s driver produces per sample.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NotFound` if no sensor is tracked at `addr7`.
    pub fn sample_size(&self, addr7: u8) -> Result<u8, ManagerError> {
        let idx = self.find_index(addr7).ok_or(ManagerError::NotFound)?;
        let guard = self.entries[idx].driver.lock().map_err(|_| ManagerError::NotFound)?;
        Ok(guard.sample_size())
    }

    /// List every tracked sensor as `(type_code, addr7)` pairs, in roster order.
    #[must_use]
    pub fn list(&self) -> Vec<(u8, u8)> {
        self.entries.iter().map(|e| (e.type_code, e.addr7)).collect()
    }

    /// Current size of the roster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LoopbackI2c;
    use crate::driver::{Driver, DriverInfo};
    use std::thread::sleep;
    use std::time::Duration;

    struct Counting(u8);
    impl Driver for Counting {
        fn init(&mut self, _bus: &dyn I2cBus) -> Result<(), DriverError> {
            Ok(())
        }
        fn read(&mut self, _bus: &dyn I2cBus) -> Result<Vec<u8>, DriverError> {
            self.0 = self.0.wrapping_add(1);
            Ok(vec![self.0])
        }
        fn sample_size(&self) -> u8 {
            1
        }
        fn configure(&mut self, _bus: &dyn I2cBus, field_id: u8, param: u8) -> Result<bool, DriverError> {
            if field_id == 21 {
                self.0 = param;
                Ok(true)
            } else {
                Ok(false)
            }
        }
        fn read_config_bytes(&self, field_id: u8) -> Option<Vec<u8>> {
            if field_id == 21 {
                Some(vec![self.0])
            } else {
                None
            }
        }
        fn field_ids(&self) -> &[u8] {
            &[21]
        }
    }

    fn registry() -> Arc<DriverRegistry> {
        let mut r = DriverRegistry::new();
        r.register(DriverInfo {
            type_code: 9,
            make: |_addr| Box::new(Counting(0)),
            default_period_ms: 10,
        });
        Arc::new(r)
    }

    fn manager() -> SensorManager<Vec<u8>> {
        let bus: Arc<dyn I2cBus> = Arc::new(LoopbackI2c::new());
        SensorManager::new(bus, registry(), Arc::new(HubLog::new(Vec::new())))
    }

    #[test]
    fn add_rejects_duplicate_address() {
        let mut m = manager();
        m.add(9, 0x40, Some(100)).unwrap();
        assert!(matches!(
            m.add(9, 0x40, Some(100)),
            Err(ManagerError::DuplicateAddress(0x40))
        ));
    }

    #[test]
    fn add_rejects_unknown_type() {
        let mut m = manager();
        assert!(matches!(
            m.add(250, 0x40, Some(100)),
            Err(ManagerError::NoSuchDriver(250))
        ));
    }

    #[test]
    fn add_rejects_over_capacity() {
        let mut m = manager();
        for addr in 0..MAX_SENSORS as u8 {
            m.add(9, addr, Some(1_000_000)).unwrap();
        }
        assert!(matches!(
            m.add(9, MAX_SENSORS as u8, Some(100)),
            Err(ManagerError::Full)
        ));
    }

    #[test]
    fn remove_then_remove_again_is_not_found() {
        let mut m = manager();
        m.add(9, 0x40, Some(1_000_000)).unwrap();
        assert!(m.remove(0x40).is_ok());
        assert!(matches!(m.remove(0x40), Err(ManagerError::NotFound)));
    }

    #[test]
    fn list_reports_roster_in_order() {
        let mut m = manager();
        m.add(9, 0x40, Some(1_000_000)).unwrap();
        m.add(9, 0x41, Some(1_000_000)).unwrap();
        assert_eq!(m.list(), vec![(9, 0x40), (9, 0x41)]);
    }

    #[test]
    fn read_before_any_tick_is_empty() {
        let mut m = manager();
        m.add(9, 0x40, Some(1_000_000)).unwrap();
        assert!(m.read(0x40, 10).unwrap().is_empty());
    }

    #[test]
    fn read_not_found_address_errors() {
        let m = manager();
        assert!(matches!(m.read(0x77, 10), Err(ManagerError::NotFound)));
    }

    #[test]
    fn set_and_get_period_round_trip() {
        let mut m = manager();
        m.add(9, 0x40, Some(500)).unwrap();
        m.set_period(0x40, 500).unwrap();
        let bytes = m
            .get_config_bytes(0x40, crate::protocol::opcode::GET_PERIOD)
            .unwrap();
        assert_eq!(bytes, vec![5]);
    }

    #[test]
    fn configure_reaches_driver_field() {
        let mut m = manager();
        m.add(9, 0x40, Some(1_000_000)).unwrap();
        assert!(m.configure(0x40, 21, 77).unwrap());
        assert_eq!(m.get_config_bytes(0x40, 21).unwrap(), vec![77]);
    }

    #[test]
    fn samples_accumulate_over_time() {
        let mut m = manager();
        m.add(9, 0x40, Some(5)).unwrap();
        sleep(Duration::from_millis(60));
        let samples = m.read(0x40, 100).unwrap();
        assert!(!samples.is_empty());
    }
}
