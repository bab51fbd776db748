//! Wire-protocol constants shared between the frame parser, the dispatcher and the response
//! builder.

/// Marker byte that starts every command and response frame.
pub const SOF: u8 = 0xAA;

/// Default board identifier, used unless overridden in the startup configuration.
pub const DEFAULT_BOARD_ID: u8 = 0x01;

/// Maximum number of sensors the manager can track at once.
pub const MAX_SENSORS: usize = 8;

/// Capacity of each sensor's sample queue.
pub const QUEUE_DEPTH: usize = 10;

/// Maximum number of raw bytes a single sample payload may carry.
pub const MAX_PAYLOAD: usize = 10;

/// How long the frame parser will wait, from the first `SOF` byte, before giving up on a frame.
pub const FRAME_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(10);

/// Fallback polling period used when a driver does not specify its own default.
pub const DEFAULT_POLL_MS: u32 = 500;

/// `SET_PERIOD`/`GET_PERIOD` parameters are counted in units of this many milliseconds.
pub const PERIOD_UNIT_MS: u32 = 100;

/// Timeout applied to individual I2C bus transactions.
pub const BUS_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(100);

/// Capacity of the channel carrying parsed commands from the frame parser to the dispatcher.
pub const COMMAND_QUEUE_DEPTH: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A single 6-byte command frame, already checksum- and board-id-validated.
pub struct Command {
    pub board_id: u8,
    pub addr7: u8,
    pub cmd: u8,
    pub param: u8,
}

/// Opcode table. Ranges `Set::*`/`Get::*` are driver-defined field identifiers.
pub mod opcode {
    pub const READ_SAMPLES: u8 = 0;
    pub const ADD_SENSOR: u8 = 1;
    pub const REMOVE_SENSOR: u8 = 2;
    pub const PING: u8 = 3;
    pub const LIST_SENSORS: u8 = 4;
    pub const SET_PAYLOAD_MASK: u8 = 5;
    pub const GET_PAYLOAD_MASK: u8 = 6;
    pub const GET_CONFIG: u8 = 7;

    pub const SET_RANGE_START: u8 = 20;
    pub const SET_RANGE_END: u8 = 29;
    pub const SET_PERIOD: u8 = 20;

    pub const GET_RANGE_START: u8 = 30;
    pub const GET_RANGE_END: u8 = 39;
    pub const GET_PERIOD: u8 = 30;

    /// Whether `cmd` falls in the driver-defined `SET_*` range.
    #[must_use]
    pub fn is_set(cmd: u8) -> bool {
        (SET_RANGE_START..=SET_RANGE_END).contains(&cmd)
    }

    /// Whether `cmd` falls in the driver-defined `GET_*` range.
    #[must_use]
    pub fn is_get(cmd: u8) -> bool {
        (GET_RANGE_START..=GET_RANGE_END).contains(&cmd)
    }
}

/// Status codes carried in every response frame.
pub mod status {
    pub const OK: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const NOT_FOUND: u8 = 2;
    pub const UNKNOWN_CMD: u8 = 3;
}
