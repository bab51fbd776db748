//! The periodic per-sensor polling worker.
//!
//! Grounded on the teacher's `sensor_listen` loop (own OS thread per logical group, sleep-based
//! scheduling, mutex-guarded reads, warn-and-continue on failure) but narrowed to exactly one
//! sensor per task and driven by a shared, externally-updatable period instead of a fixed
//! configuration value.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::bus::I2cBus;
use crate::console::HubLog;
use crate::driver::Driver;
use crate::protocol::MAX_PAYLOAD;
use crate::sample::{Sample, SampleQueue};

/// A running sensor worker: owns the join handle and the stop flag for one sensor.
pub struct SensorTaskHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SensorTaskHandle {
    /// Spawn the worker thread. `driver.init` is guaranteed to run, under the bus mutex, as the
    /// first thing the thread does.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn<W: std::io::Write + Send + 'static>(
        addr7: u8,
        bus: Arc<dyn I2cBus>,
        driver: Arc<Mutex<Box<dyn Driver>>>,
        queue: Arc<Mutex<SampleQueue>>,
        period_ms: Arc<AtomicU32>,
        log: Arc<HubLog<W>>,
        epoch: Instant,
    ) -> SensorTaskHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            run(
                addr7,
                &bus,
                &driver,
                &queue,
                &period_ms,
                &log,
                epoch,
                &stop_for_thread,
            );
        });

        SensorTaskHandle {
            stop,
            handle: Some(handle),
        }
    }

    /// Signal the worker to stop and join it. Idempotent-safe to call at most once (enforced by
    /// `SensorManager::remove`, which owns the only handle).
    pub fn stop_and_join(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for SensorTaskHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run<W: std::io::Write>(
    addr7: u8,
    bus: &Arc<dyn I2cBus>,
    driver: &Arc<Mutex<Box<dyn Driver>>>,
    queue: &Arc<Mutex<SampleQueue>>,
    period_ms: &Arc<AtomicU32>,
    log: &HubLog<W>,
    epoch: Instant,
    stop: &AtomicBool,
) {
    {
        let mut guard = match driver.lock() {
            Ok(g) => g,
            Err(_) => return,
        };
        if let Err(e) = guard.init(bus.as_ref()) {
            let _ = log.warn(&format!("sensor 0x{addr7:02x}: init failed: {e}"));
        }
    }

    let mut next_wake = Instant::now();
    while !stop.load(Ordering::SeqCst) {
        next_wake += Duration::from_millis(u64::from(period_ms.load(Ordering::SeqCst)));

        let read_result = {
            let mut guard = match driver.lock() {
                Ok(g) => g,
                Err(_) => break,
            };
            guard.read(bus.as_ref())
        };

        match read_result {
            Ok(bytes) if bytes.len() <= MAX_PAYLOAD => {
                let tick = Instant::now().saturating_duration_since(epoch).as_millis() as u32;
                let sample = Sample::new(tick, &bytes);
                if let Ok(mut q) = queue.lock() {
                    q.push(sample);
                }
            }
            Ok(bytes) => {
                let _ = log.warn(&format!(
                    "sensor 0x{addr7:02x}: oversize read ({} bytes), dropping",
                    bytes.len()
                ));
            }
            Err(e) => {
                let _ = log.warn(&format!("sensor 0x{addr7:02x}: read failed: {e}"));
            }
        }

        // sleep in short chunks so a stop signal raised mid-period is noticed promptly instead
        // of only between whole polling cycles
        const SLEEP_CHUNK: Duration = Duration::from_millis(20);
        loop {
            let now = Instant::now();
            if next_wake <= now || stop.load(Ordering::SeqCst) {
                if next_wake <= now {
                    // we're behind schedule; resync instead of accumulating drift
                    next_wake = now;
                }
                break;
            }
            thread::sleep((next_wake - now).min(SLEEP_CHUNK));
        }
    }
}
