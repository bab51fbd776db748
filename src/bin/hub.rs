//! Entry point for running the hub against real hardware: a Linux I2C char device and a real
//! serial port, both named in the configuration file passed as the first argument.

use sensorhub::server::{self, LinuxBackend};

fn main() {
    if let Err(e) = server::run::<LinuxBackend>() {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}
