//! Entry point for running the hub with no hardware attached: an in-process loopback bus and
//! serial link, useful for smoke-testing the dispatcher and sensor manager on any machine.

use sensorhub::server::{self, LoopbackBackend};

fn main() {
    if let Err(e) = server::run::<LoopbackBackend>() {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}
