//! Wiring together a concrete [`Backend`] with the reader/parser thread, the dispatcher thread,
//! and (indirectly, through [`SensorManager`]) one worker thread per active sensor.
//!
//! Grounded on the teacher's `server::run` (a `MakeHardware`-parameterized entry point that opens
//! log files, builds hardware, then hands control to `thread::scope`), narrowed to this crate's
//! single serial link and single I2C bus instead of a TCP listener accepting many dashboard
//! clients.

use std::fs::File;
use std::io::{BufReader, Write as IoWrite};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use crate::bus::{I2cBus, LinuxI2c, LinuxSerial, LoopbackI2c, LoopbackSerial, SerialLink};
use crate::config::{ConfigError, HubConfig};
use crate::console::HubLog;
use crate::dispatcher::CommandDispatcher;
use crate::frame::FrameParser;
use crate::ina219;
use crate::manager::SensorManager;
use crate::protocol::COMMAND_QUEUE_DEPTH;
use crate::registry::DriverRegistry;
use crate::HubError;

/// Dependency-injected construction of the concrete `I2cBus`/`SerialLink` pair, so production
/// code and tests share the rest of the wiring. This plays the role the teacher's `MakeHardware`
/// trait played for GPIO/SPI.
pub trait Backend {
    /// The concrete serial transport this backend provides.
    type Serial: SerialLink + 'static;

    /// Build the bus and serial link described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `HubError` if the underlying device(s) cannot be opened.
    fn build(config: &HubConfig) -> Result<(Arc<dyn I2cBus>, Self::Serial), HubError>;
}

/// Real Linux I2C char device plus a real serial port, via `i2cdev`/`serialport`.
pub struct LinuxBackend;

impl Backend for LinuxBackend {
    type Serial = LinuxSerial;

    fn build(config: &HubConfig) -> Result<(Arc<dyn I2cBus>, Self::Serial), HubError> {
        let i2c_path = config
            .i2c_path
            .as_deref()
            .ok_or(HubError::Config(ConfigError::MissingBackendPaths))?;
        let serial_path = config
            .serial_path
            .as_deref()
            .ok_or(HubError::Config(ConfigError::MissingBackendPaths))?;

        let bus: Arc<dyn I2cBus> = Arc::new(LinuxI2c::open(i2c_path)?);
        let serial = LinuxSerial::open(serial_path, config.baud_rate)?;
        Ok((bus, serial))
    }
}

/// In-process loopback, for running the hub without hardware attached. Since a loopback pair has
/// two ends, this backend only hands back the board-facing half; the host half is simply dropped,
/// which is harmless (the board side just never receives a byte) and matches the intended use
/// of this backend as a no-controller-attached smoke test.
pub struct LoopbackBackend;

impl Backend for LoopbackBackend {
    type Serial = LoopbackSerial;

    fn build(_config: &HubConfig) -> Result<(Arc<dyn I2cBus>, Self::Serial), HubError> {
        let bus: Arc<dyn I2cBus> = Arc::new(LoopbackI2c::new());
        let (_host, board) = LoopbackSerial::pair();
        Ok((bus, board))
    }
}

fn default_registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    registry.register(ina219::driver_info());
    registry
}

/// Load the configuration named in `argv[1]`, build a `B::Serial`/`I2cBus` pair from it, and run
/// the hub until the serial link closes.
///
/// # Errors
///
/// Returns `HubError` if the configuration file cannot be read/parsed, or the backend cannot be
/// constructed.
pub fn run<B: Backend>() -> Result<(), HubError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let json_path = args.first().ok_or_else(|| {
        HubError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no configuration path given",
        ))
    })?;

    let config_file = File::open(json_path)?;
    let config = HubConfig::parse(&mut BufReader::new(config_file))?;

    let log_buffer: Box<dyn IoWrite + Send> = match &config.log_path {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(std::io::sink()),
    };
    let log = Arc::new(HubLog::new(log_buffer));
    log.info(&format!(
        "loaded configuration for board 0x{:02x}",
        config.board_id
    ))?;

    let (bus, serial) = B::build(&config)?;
    run_with_serial(&config, bus, serial, log)
}

/// The portion of `run` that is independent of how the serial link, bus and log destination were
/// constructed, split out so tests (and alternate entry points) can drive it directly.
///
/// # Errors
///
/// Currently infallible once past construction; returns `HubError` for symmetry with `run` and
/// to leave room for a future fallible shutdown path.
pub fn run_with_serial<S, W>(
    config: &HubConfig,
    bus: Arc<dyn I2cBus>,
    mut serial: S,
    log: Arc<HubLog<W>>,
) -> Result<(), HubError>
where
    S: SerialLink + 'static,
    W: IoWrite + Send + 'static,
{
    let registry = Arc::new(default_registry());
    let manager = SensorManager::new(bus, registry, Arc::clone(&log));
    let mut dispatcher = CommandDispatcher::new(config.board_id, manager);

    let (cmd_tx, cmd_rx) = mpsc::sync_channel(COMMAND_QUEUE_DEPTH);
    let (resp_tx, resp_rx) = mpsc::channel::<Vec<u8>>();

    std::thread::scope(|scope| {
        scope.spawn(move || {
            let mut parser = FrameParser::new(config.board_id);
            loop {
                // drain any responses the dispatcher has queued before blocking on the next byte,
                // so replies go out promptly instead of waiting for more serial traffic
                while let Ok(frame) = resp_rx.try_recv() {
                    let _ = serial.write_frame(&frame);
                }
                match serial.read_byte() {
                    Ok(Some(byte)) => {
                        if let Some(cmd) = parser.feed(byte, Instant::now()) {
                            if cmd_tx.try_send(cmd).is_err() {
                                let _ = log.warn("command queue full, dropping parsed command");
                            }
                        }
                    }
                    Ok(None) => continue,
                    Err(_) => break,
                }
            }
        });

        scope.spawn(move || {
            while let Ok(cmd) = cmd_rx.recv() {
                let frame = dispatcher.handle(cmd);
                if resp_tx.send(frame).is_err() {
                    break;
                }
            }
        });
    });

    Ok(())
}
