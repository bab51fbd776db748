//! Leveled, timestamped logging for the hub, written to stdout (with terminal coloring) and
//! mirrored into a log buffer.

use std::fmt::Display;
use std::io::Write;
use std::sync::Mutex;

use chrono::Local;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
/// The levels for logging.
enum LogLevel {
    /// Used for diagnostic detail (frame rejections, individual bus retries).
    Debug = 0,
    /// Routine, useful-after-the-fact information (sensor added, client connected).
    Info = 1,
    /// Nonfatal problems (a single failed read, a dropped frame).
    Warn = 2,
    /// Fatal or near-fatal conditions.
    Critical = 3,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                LogLevel::Debug => "DEBUG",
                LogLevel::Info => "INFO",
                LogLevel::Warn => "WARN",
                LogLevel::Critical => "CRITICAL",
            }
        )
    }
}

/// A log for information displayed to whoever is operating the hub. Writes go to stdout (colored
/// by level) and are also mirrored into `buf`. Callers that don't want a log file can hand in
/// `io::sink()`; tests typically hand in a `Vec<u8>` to inspect what was logged.
pub struct HubLog<W: Write> {
    log_buffer: Mutex<W>,
}

impl<W: Write> HubLog<W> {
    /// Construct a new `HubLog`. Everything logged is also copied into `buf`.
    pub fn new(buf: W) -> HubLog<W> {
        HubLog {
            log_buffer: Mutex::new(buf),
        }
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn debug(&self, string: &str) -> std::io::Result<()> {
        self.write(LogLevel::Debug, string)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn info(&self, string: &str) -> std::io::Result<()> {
        self.write(LogLevel::Info, string)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn warn(&self, string: &str) -> std::io::Result<()> {
        self.write(LogLevel::Warn, string)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn critical(&self, string: &str) -> std::io::Result<()> {
        self.write(LogLevel::Critical, string)
    }

    /// Write one log line, timestamped and optionally colored on stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if we are unable to write to the log buffer.
    fn write(&self, level: LogLevel, string: &str) -> std::io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

        match level {
            LogLevel::Critical => print!("\x1b[31m"), // red
            LogLevel::Warn => print!("\x1b[33m"),     // yellow
            LogLevel::Info => (),
            LogLevel::Debug => print!("\x1b[90m"), // faded
        };
        println!("[{timestamp}] [{level}] {string}");
        print!("\x1b[0m");

        writeln!(self.log_buffer.lock().unwrap(), "[{timestamp}] [{level}] {string}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_mirrored_into_buffer() {
        let log = HubLog::new(Vec::<u8>::new());
        log.info("hello").unwrap();
        log.warn("careful").unwrap();
        let buf = log.log_buffer.lock().unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains("[INFO] hello"));
        assert!(text.contains("[WARN] careful"));
    }
}
