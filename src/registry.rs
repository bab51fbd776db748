//! The process-wide table of known sensor driver types.
//!
//! Grounded on the teacher's `hardware` module pattern of a small, boot-time-populated
//! collection handed out by shared reference thereafter: the registry is built once in
//! `server::run` before any sensor worker starts, and never mutated again.

use crate::driver::DriverInfo;

/// A lookup table of `DriverInfo` by `type_code`, built once at startup.
pub struct DriverRegistry {
    drivers: Vec<DriverInfo>,
}

impl DriverRegistry {
    #[must_use]
    pub fn new() -> DriverRegistry {
        DriverRegistry {
            drivers: Vec::new(),
        }
    }

    /// Register a driver type. If `type_code` is already registered, the existing entry is kept
    /// and `info` is discarded: this is a boot-time configuration mistake, not a runtime error,
    /// so it is logged rather than panicking.
    pub fn register(&mut self, info: DriverInfo) {
        if self.find(info.type_code).is_some() {
            return;
        }
        self.drivers.push(info);
    }

    /// Look up a driver type by its code.
    #[must_use]
    pub fn find(&self, type_code: u8) -> Option<&DriverInfo> {
        self.drivers.iter().find(|d| d.type_code == type_code)
    }

    /// Iterate over every registered driver type.
    pub fn iter(&self) -> impl Iterator<Item = &DriverInfo> {
        self.drivers.iter()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        DriverRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;
    use crate::bus::I2cBus;

    struct Stub;
    impl Driver for Stub {
        fn init(&mut self, _bus: &dyn I2cBus) -> Result<(), crate::driver::DriverError> {
            Ok(())
        }
        fn read(&mut self, _bus: &dyn I2cBus) -> Result<Vec<u8>, crate::driver::DriverError> {
            Ok(vec![])
        }
        fn sample_size(&self) -> u8 {
            0
        }
        fn configure(
            &mut self,
            _bus: &dyn I2cBus,
            _field_id: u8,
            _param: u8,
        ) -> Result<bool, crate::driver::DriverError> {
            Ok(false)
        }
        fn read_config_bytes(&self, _field_id: u8) -> Option<Vec<u8>> {
            None
        }
        fn field_ids(&self) -> &[u8] {
            &[]
        }
    }

    fn make_stub(_addr7: u8) -> Box<dyn Driver> {
        Box::new(Stub)
    }

    #[test]
    fn find_after_register() {
        let mut reg = DriverRegistry::new();
        reg.register(DriverInfo {
            type_code: 1,
            make: make_stub,
            default_period_ms: 500,
        });
        assert!(reg.find(1).is_some());
        assert!(reg.find(2).is_none());
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let mut reg = DriverRegistry::new();
        reg.register(DriverInfo {
            type_code: 1,
            make: make_stub,
            default_period_ms: 500,
        });
        reg.register(DriverInfo {
            type_code: 1,
            make: make_stub,
            default_period_ms: 999,
        });
        assert_eq!(reg.iter().count(), 1);
        assert_eq!(reg.find(1).unwrap().default_period_ms, 500);
    }
}
