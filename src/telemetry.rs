//! Driver-facing telemetry.
//!
//! Telemetry is fire and forget: moves report progress through it, but no
//! decision ever depends on what a sink does with the data. Values are
//! staged with [`Telemetry::report`] and published as one frame by
//! [`Telemetry::flush`].
//!
//! # Example
//!
//! ```ignore
//! use autodrive::telemetry::{LogTelemetry, Telemetry};
//!
//! let mut telemetry = LogTelemetry::new();
//! telemetry.report("Starting at", format_args!("{:7} :{:7}", 0, 0));
//! telemetry.flush();
//! ```

use std::{
    fmt,
    time::{Duration, Instant},
};

use heapless::HistoryBuffer;
use log::{Level, log};

/// A sink for key/value progress data.
pub trait Telemetry {
    /// Stages one line for the next frame.
    fn report(&mut self, key: &str, value: fmt::Arguments<'_>);

    /// Publishes the staged lines and clears them.
    fn flush(&mut self);
}

/// Discards everything.
impl Telemetry for () {
    fn report(&mut self, _key: &str, _value: fmt::Arguments<'_>) {}

    fn flush(&mut self) {}
}

impl<T: Telemetry + ?Sized> Telemetry for &mut T {
    fn report(&mut self, key: &str, value: fmt::Arguments<'_>) { (**self).report(key, value) }

    fn flush(&mut self) { (**self).flush() }
}

/// Publishes frames through the [`log`] facade.
///
/// Every published frame becomes a single log record at the configured
/// level, with the staged lines joined by `" | "`. Moves flush once per
/// polling iteration, so a frame with the same keys as the last published
/// one is dropped until [`DEFAULT_LOG_INTERVAL`] has passed. A frame with
/// different keys, like a routine's final `Path` line, is always published.
#[derive(Debug)]
pub struct LogTelemetry {
    level:     Level,
    interval:  Duration,
    frame:     Vec<(String, String)>,
    last_keys: Vec<String>,
    last_at:   Option<Instant>,
    published: u64,
}

/// Minimum spacing of repeated frames.
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_millis(250);

impl LogTelemetry {
    /// A sink logging frames at [`Level::Info`].
    pub fn new() -> Self { Self::with_level(Level::Info) }

    /// A sink logging frames at `level`.
    ///
    /// Per-iteration move progress is chatty; [`Level::Trace`] keeps it out
    /// of ordinary logs.
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            interval: DEFAULT_LOG_INTERVAL,
            frame: Vec::new(),
            last_keys: Vec::new(),
            last_at: None,
            published: 0,
        }
    }

    /// Sets the minimum spacing of repeated frames.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Number of frames logged so far.
    pub fn published(&self) -> u64 { self.published }

    fn is_repeat(&self) -> bool {
        self.frame.len() == self.last_keys.len() &&
            self.frame.iter().zip(&self.last_keys).all(|((k, _), last)| k == last)
    }
}

impl Default for LogTelemetry {
    fn default() -> Self { Self::new() }
}

impl Telemetry for LogTelemetry {
    fn report(&mut self, key: &str, value: fmt::Arguments<'_>) {
        self.frame.push((key.to_owned(), value.to_string()));
    }

    fn flush(&mut self) {
        if self.frame.is_empty() {
            return;
        }
        let throttled = self.is_repeat() &&
            self.last_at.is_some_and(|at| at.elapsed() < self.interval);
        if throttled {
            self.frame.clear();
            return;
        }

        let line = self
            .frame
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(" | ");
        log!(target: "autodrive::telemetry", self.level, "{}", line);

        self.last_keys = self.frame.drain(..).map(|(k, _)| k).collect();
        self.last_at = Some(Instant::now());
        self.published += 1;
    }
}

/// Frames kept by a [`BufferedTelemetry`].
pub const BUFFERED_FRAMES: usize = 256;

type Frame = Vec<(String, String)>;

/// Keeps the most recent [`BUFFERED_FRAMES`] flushed frames in memory.
///
/// Useful for a host display, and for asserting on what a routine reported.
/// Older frames are overwritten once the buffer is full.
pub struct BufferedTelemetry {
    staged: Frame,
    frames: HistoryBuffer<Frame, BUFFERED_FRAMES>,
}

impl BufferedTelemetry {
    /// An empty buffer.
    pub fn new() -> Self {
        Self {
            staged: Vec::new(),
            frames: HistoryBuffer::new(),
        }
    }

    /// The kept frames, oldest first.
    pub fn frames(&self) -> impl Iterator<Item = &[(String, String)]> + '_ {
        self.frames.oldest_ordered().map(Vec::as_slice)
    }

    /// Number of frames kept.
    pub fn frame_count(&self) -> usize { self.frames.len() }

    /// The most recent value flushed under `key`.
    pub fn last(&self, key: &str) -> Option<&str> {
        self.frames()
            .flat_map(|frame| frame.iter())
            .filter(|(k, _)| k == key)
            .last()
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for BufferedTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedTelemetry")
            .field("staged", &self.staged)
            .field("frames", &self.frames.len())
            .finish()
    }
}

impl Default for BufferedTelemetry {
    fn default() -> Self { Self::new() }
}

impl Telemetry for BufferedTelemetry {
    fn report(&mut self, key: &str, value: fmt::Arguments<'_>) {
        self.staged.push((key.to_owned(), value.to_string()));
    }

    fn flush(&mut self) {
        if !self.staged.is_empty() {
            self.frames.write(std::mem::take(&mut self.staged));
        }
    }
}
