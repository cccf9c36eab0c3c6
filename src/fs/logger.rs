//! Console and file logger.
//!
//! This module implements the [`log`] crate's logging facade, writing each
//! record to the console and to a log file.
//!
//! # Usage
//!
//! Initialize the logger once at the start of your program:
//!
//! ```ignore
//! use autodrive::fs::logger;
//! use log::{info, warn, LevelFilter};
//!
//! fn main() {
//!     logger::init(LevelFilter::Debug).expect("Logger init failed");
//!
//!     info!("Program started");
//!     warn!("This is a warning");
//! }
//! ```
//!
//! # Log Output
//!
//! Each entry holds the level, the time since the logger started, the target
//! and the message:
//!
//! ```text
//! INFO [2s 5ms] autodrive::motion::encoder - Move reached MotorTargets { left: 4800, right: 4800 }
//! WARN [7s 260ms] autodrive::motion::encoder - Move timed out after 4s
//! ```

use std::{
    fmt,
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::Path,
    sync::{Mutex, OnceLock},
    time::{Duration, Instant},
};

use humantime::format_duration;
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

/// Default log file, relative to the working directory.
pub const DEFAULT_LOG_PATH: &str = "log.txt";

/// A dual-output logger.
///
/// The file is created or truncated when the logger is built. If it cannot
/// be opened (no SD card, read-only directory) only the console is written.
pub struct DriveLogger {
    file_writer: Mutex<Option<BufWriter<std::fs::File>>>,
    started:     Instant,
}

impl DriveLogger {
    fn new(path: &Path) -> Self {
        let file_writer = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .ok()
            .map(BufWriter::new);

        Self {
            file_writer: Mutex::new(file_writer),
            started:     Instant::now(),
        }
    }
}

impl log::Log for DriveLogger {
    fn enabled(&self, metadata: &Metadata) -> bool { metadata.level() <= log::max_level() }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let log_line = format_line(
            record.level(),
            self.started.elapsed(),
            record.target(),
            record.args(),
        );

        print!("{}", log_line);

        if let Ok(mut writer_guard) = self.file_writer.lock() {
            if let Some(ref mut writer) = *writer_guard {
                let _ = writer.write_all(log_line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut writer_guard) = self.file_writer.lock() {
            if let Some(ref mut writer) = *writer_guard {
                let _ = writer.flush();
            }
        }
    }
}

static LOGGER: OnceLock<DriveLogger> = OnceLock::new();

/// Initializes the logger, writing to `log.txt`.
///
/// # Arguments
///
/// * `level` - The minimum log level to record. Move progress telemetry is
///   logged at [`LevelFilter::Trace`].
///
/// # Errors
///
/// Returns [`SetLoggerError`] if a logger has already been set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> { init_with_path(level, DEFAULT_LOG_PATH) }

/// Initializes the logger, writing to `path`.
///
/// # Errors
///
/// Returns [`SetLoggerError`] if a logger has already been set.
///
/// # Example
///
/// ```ignore
/// use autodrive::fs::logger;
/// use log::LevelFilter;
///
/// logger::init_with_path(LevelFilter::Info, "/tmp/autodrive.log")?;
/// ```
pub fn init_with_path(level: LevelFilter, path: impl AsRef<Path>) -> Result<(), SetLoggerError> {
    let logger = LOGGER.get_or_init(|| DriveLogger::new(path.as_ref()));
    log::set_logger(logger).map(|()| log::set_max_level(level))
}

fn format_line(level: Level, elapsed: Duration, target: &str, args: &fmt::Arguments<'_>) -> String {
    // Millisecond resolution keeps the timestamps readable
    let elapsed = Duration::from_millis(elapsed.as_millis() as u64);
    format!("{} [{}] {} - {}\n", level, format_duration(elapsed), target, args)
}
