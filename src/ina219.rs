//! Driver for the INA219 current/voltage/power monitor.
//!
//! This is the one concrete sensor type shipped with the hub; register semantics (LSB scaling
//! for bus voltage, shunt voltage, current and power, and the calibration-register relationship)
//! follow the reference INA219 driver this crate was adapted from.

use std::time::Duration;

use crate::bus::{BusError, I2cBus};
use crate::driver::{Driver, DriverError, DriverInfo};

/// Sensor type code for the INA219, as carried in `ADD_SENSOR`'s parameter.
pub const TYPE_CODE: u8 = 1;

const REG_CONFIG: u8 = 0x00;
const REG_SHUNT_VOLTAGE: u8 = 0x01;
const REG_BUS_VOLTAGE: u8 = 0x02;
const REG_POWER: u8 = 0x03;
const REG_CURRENT: u8 = 0x04;
const REG_CALIBRATION: u8 = 0x05;

/// Reset-value configuration: 32V bus range, gain /8, 12-bit ADC, continuous shunt+bus mode.
const DEFAULT_CONFIG: u16 = 0x399F;
/// Calibration register value chosen so that the current LSB is 100 uA and the power LSB is
/// (as required by the INA219) twenty times that.
const DEFAULT_CALIBRATION: u16 = 4096;

/// `SET_*`-range field ids, used directly as the `cmd` byte of a `SET_*` opcode (20-29).
pub mod field {
    pub const CALIBRATION: u8 = 21;
    pub const GAIN: u8 = 22;
    pub const BUS_RANGE: u8 = 23;
}

/// `GET_*`-range field ids, used directly as the `cmd` byte of a `GET_*` opcode (30-39). Each
/// one names the same underlying field as its `field` counterpart, offset into the getter range
/// the wire protocol reserves for it.
pub mod get_field {
    pub const CALIBRATION: u8 = 31;
    pub const GAIN: u8 = 32;
    pub const BUS_RANGE: u8 = 33;
}

/// Bit positions within the payload mask. Bit set means "include this field in samples".
pub mod mask_bit {
    pub const BUS_VOLTAGE: u8 = 0b0001;
    pub const SHUNT_VOLTAGE: u8 = 0b0010;
    pub const CURRENT: u8 = 0b0100;
    pub const POWER: u8 = 0b1000;
}

/// The reserved field id used by `SET_PAYLOAD_MASK`/`GET_PAYLOAD_MASK` to reach into a driver's
/// payload mask through the ordinary `configure`/`read_config_bytes` path.
pub const PAYLOAD_MASK_FIELD: u8 = 0xFE;

/// Driver state for one INA219 device.
pub struct Ina219 {
    addr7: u8,
    gain: u8,
    bus_range: u8,
    calibration: u16,
    payload_mask: u8,
}

impl Ina219 {
    #[must_use]
    fn new(addr7: u8) -> Ina219 {
        Ina219 {
            addr7,
            gain: 3,
            bus_range: 1,
            calibration: DEFAULT_CALIBRATION,
            payload_mask: mask_bit::BUS_VOLTAGE | mask_bit::SHUNT_VOLTAGE,
        }
    }

    fn write_reg(&self, bus: &dyn I2cBus, reg: u8, value: u16) -> Result<(), BusError> {
        let buf = [reg, (value >> 8) as u8, value as u8];
        bus.write(self.addr7, &buf, Duration::from_millis(100))
    }

    fn read_reg(&self, bus: &dyn I2cBus, reg: u8) -> Result<u16, BusError> {
        bus.write(self.addr7, &[reg], Duration::from_millis(100))?;
        let mut out = [0u8; 2];
        bus.read(self.addr7, &mut out, Duration::from_millis(100))?;
        Ok(u16::from_be_bytes(out))
    }

    fn recompute_calibration(&self) -> u16 {
        self.calibration
    }

    fn read_bus_voltage_mv(&self, bus: &dyn I2cBus) -> Result<u16, BusError> {
        let raw = self.read_reg(bus, REG_BUS_VOLTAGE)?;
        Ok((raw >> 3) * 4)
    }

    fn read_shunt_voltage_uv(&self, bus: &dyn I2cBus) -> Result<i16, BusError> {
        let raw = self.read_reg(bus, REG_SHUNT_VOLTAGE)? as i16;
        Ok(raw.saturating_mul(10))
    }

    fn read_current_raw(&self, bus: &dyn I2cBus) -> Result<u16, BusError> {
        self.read_reg(bus, REG_CURRENT)
    }

    fn read_power_raw(&self, bus: &dyn I2cBus) -> Result<u16, BusError> {
        let raw = self.read_reg(bus, REG_POWER)?;
        Ok(raw.saturating_mul(20))
    }
}

impl Driver for Ina219 {
    fn init(&mut self, bus: &dyn I2cBus) -> Result<(), DriverError> {
        self.write_reg(bus, REG_CONFIG, DEFAULT_CONFIG)?;
        self.write_reg(bus, REG_CALIBRATION, self.recompute_calibration())?;
        Ok(())
    }

    fn read(&mut self, bus: &dyn I2cBus) -> Result<Vec<u8>, DriverError> {
        let mut out = Vec::with_capacity(8);
        if self.payload_mask & mask_bit::BUS_VOLTAGE != 0 {
            out.extend_from_slice(&self.read_bus_voltage_mv(bus)?.to_be_bytes());
        }
        if self.payload_mask & mask_bit::SHUNT_VOLTAGE != 0 {
            out.extend_from_slice(&self.read_shunt_voltage_uv(bus)?.to_be_bytes());
        }
        if self.payload_mask & mask_bit::CURRENT != 0 {
            out.extend_from_slice(&self.read_current_raw(bus)?.to_be_bytes());
        }
        if self.payload_mask & mask_bit::POWER != 0 {
            out.extend_from_slice(&self.read_power_raw(bus)?.to_be_bytes());
        }
        Ok(out)
    }

    fn sample_size(&self) -> u8 {
        (self.payload_mask.count_ones() * 2) as u8
    }

    fn configure(&mut self, bus: &dyn I2cBus, field_id: u8, param: u8) -> Result<bool, DriverError> {
        match field_id {
            field::CALIBRATION => {
                self.calibration = u16::from(param) << 4;
                self.write_reg(bus, REG_CALIBRATION, self.calibration)?;
                Ok(true)
            }
            field::GAIN => {
                self.gain = param & 0x3;
                Ok(true)
            }
            field::BUS_RANGE => {
                self.bus_range = param & 0x1;
                Ok(true)
            }
            PAYLOAD_MASK_FIELD => {
                self.payload_mask = param;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn read_config_bytes(&self, field_id: u8) -> Option<Vec<u8>> {
        match field_id {
            get_field::CALIBRATION => Some(self.calibration.to_be_bytes().to_vec()),
            get_field::GAIN => Some(vec![self.gain]),
            get_field::BUS_RANGE => Some(vec![self.bus_range]),
            PAYLOAD_MASK_FIELD => Some(vec![self.payload_mask]),
            _ => None,
        }
    }

    fn field_ids(&self) -> &[u8] {
        &[get_field::CALIBRATION, get_field::GAIN, get_field::BUS_RANGE]
    }
}

/// Construct the `DriverInfo` entry for the INA219, to be handed to `DriverRegistry::register`.
#[must_use]
pub fn driver_info() -> DriverInfo {
    DriverInfo {
        type_code: TYPE_CODE,
        make: |addr7| Box::new(Ina219::new(addr7)),
        default_period_ms: 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LoopbackI2c;

    #[test]
    fn init_writes_config_and_calibration() {
        let bus = LoopbackI2c::new();
        let mut drv = Ina219::new(0x40);
        assert!(drv.init(&bus).is_ok());
    }

    #[test]
    fn sample_size_matches_mask() {
        let drv = Ina219::new(0x40);
        // default mask has two fields enabled
        assert_eq!(drv.sample_size(), 4);
    }

    #[test]
    fn payload_mask_configure_changes_sample_size() {
        let bus = LoopbackI2c::new();
        let mut drv = Ina219::new(0x40);
        drv.configure(&bus, PAYLOAD_MASK_FIELD, 0b1111).unwrap();
        assert_eq!(drv.sample_size(), 8);
        assert_eq!(
            drv.read_config_bytes(PAYLOAD_MASK_FIELD),
            Some(vec![0b1111])
        );
    }

    #[test]
    fn read_respects_mask() {
        let bus = LoopbackI2c::new();
        let mut drv = Ina219::new(0x40);
        drv.init(&bus).unwrap();
        bus.seed(0x40, vec![0, 100]);
        let payload = drv.read(&bus).unwrap();
        assert_eq!(payload.len(), usize::from(drv.sample_size()));
    }

    #[test]
    fn set_and_get_calibration_use_distinct_opcode_ranges() {
        let bus = LoopbackI2c::new();
        let mut drv = Ina219::new(0x40);
        drv.configure(&bus, field::CALIBRATION, 200).unwrap();
        assert_eq!(
            drv.read_config_bytes(get_field::CALIBRATION),
            Some((200u16 << 4).to_be_bytes().to_vec())
        );
        // the SET-range id means nothing to the getter, and vice versa
        assert_eq!(drv.read_config_bytes(field::CALIBRATION), None);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let bus = LoopbackI2c::new();
        let mut drv = Ina219::new(0x40);
        assert!(!drv.configure(&bus, 99, 0).unwrap());
        assert_eq!(drv.read_config_bytes(99), None);
    }
}
