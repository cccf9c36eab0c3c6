//! Robot configuration.
//!
//! Everything that used to be a numeric literal in a routine lives here, in
//! one JSON document with a default for every section:
//!
//! ```json
//! {
//!     "drive":  { "counts_per_motor_rev": 8192, "gear_reduction": 0.857, "wheel_diameter_inches": 2.756 },
//!     "motion": { "settle_ms": 250, "arrival": "first_arrival" },
//!     "auton":  { "legs": [], "final_pause_ms": 1000 },
//!     "field":  { "track_width_inches": 15.28, "field_size_inches": 144 }
//! }
//! ```
//!
//! Values are validated while they are parsed, so a loaded configuration is
//! always usable.

use std::{fs, path::Path, time::Duration};

use log::info;
use serde::Deserialize;
use snafu::ResultExt;

use crate::{
    auton::AutonPlan,
    error::{ConfigParseSnafu, ConfigReadSnafu, Result},
    motion::{
        encoder::{ArrivalPolicy, DriveConfig, EncoderDrive, DEFAULT_SETTLE},
        route::planner::RouterConfig,
    },
    peripherals::{drivetrain::FourWheel, SessionClock, SessionState},
    telemetry::Telemetry,
};

/// Move controller behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionConfig {
    /// Pause after every move, in milliseconds.
    pub settle_ms: u64,
    /// When a move counts as arrived.
    pub arrival:   ArrivalPolicy,
}

impl MotionConfig {
    /// The settle delay as a [`Duration`].
    pub fn settle(&self) -> Duration { Duration::from_millis(self.settle_ms) }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            settle_ms: DEFAULT_SETTLE.as_millis() as u64,
            arrival:   ArrivalPolicy::default(),
        }
    }
}

/// The full robot configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobotConfig {
    /// Drive geometry.
    pub drive:  DriveConfig,
    /// Move controller behaviour.
    pub motion: MotionConfig,
    /// The autonomous plan.
    pub auton:  AutonPlan,
    /// Field geometry and routing speeds.
    pub field:  RouterConfig,
}

impl RobotConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// [`DriveError::ConfigParse`](crate::error::DriveError::ConfigParse)
    /// for malformed JSON, unknown keys, or values that fail validation.
    pub fn from_json_str(json: &str) -> Result<Self> { serde_json::from_str(json).context(ConfigParseSnafu) }

    /// Reads and validates a JSON file.
    ///
    /// # Errors
    ///
    /// [`DriveError::ConfigRead`](crate::error::DriveError::ConfigRead) if
    /// the file cannot be read, otherwise as for
    /// [`RobotConfig::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).context(ConfigReadSnafu {
            path: path.display().to_string(),
        })?;
        let config = Self::from_json_str(&json)?;
        info!(
            "Loaded {} ({} legs, {:.1} counts/in)",
            path.display(),
            config.auton.legs.len(),
            config.drive.counts_per_inch()
        );
        Ok(config)
    }

    /// A move controller on `drivetrain`'s reference pair, using this
    /// configuration's geometry, settle delay and arrival policy.
    pub fn encoder_drive<C, S, T>(
        &self,
        drivetrain: &FourWheel,
        clock: C,
        session: S,
        telemetry: T,
    ) -> EncoderDrive<C, S, T>
    where
        C: SessionClock,
        S: SessionState,
        T: Telemetry,
    {
        EncoderDrive::new(
            self.drive,
            drivetrain.left_reference(),
            drivetrain.right_reference(),
            clock,
            session,
            telemetry,
        )
        .with_policy(self.motion.arrival)
        .with_settle(self.motion.settle())
    }
}
