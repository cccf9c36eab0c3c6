//! # Autodrive
//!
//! Autodrive is a small autonomous-drive framework for four-motor competition
//! robots. It provides:
//!
//! - **Encoder Moves**: Closed-loop relative moves that convert inches to
//!   encoder targets and let the motor controllers' position servos do the
//!   work, with timeout, cooperative cancellation and a settle delay.
//! - **Drivetrain Control**: A four-wheel drivetrain with a configurable
//!   direction table for open-loop moves, including mecanum strafes and
//!   diagonals.
//! - **Routing**: Field pose tracking and point-and-shoot planning on top of
//!   encoder moves.
//! - **Autonomous Plans**: Routines described as data and loaded from JSON.
//! - **Logging**: A console and file logger, plus telemetry frames for the
//!   driver station.
//!
//! ## Quick Start
//!
//! ```ignore
//! use autodrive::{
//!     auton::Autonomous,
//!     config::RobotConfig,
//!     peripherals::{drivetrain::FourWheel, HostClock},
//!     telemetry::LogTelemetry,
//! };
//!
//! let config = RobotConfig::load("robot.json")?;
//! let drivetrain = FourWheel::new(front_left, front_right, back_left, back_right);
//! let mut drive = config.encoder_drive(&drivetrain, HostClock::new(), || true, LogTelemetry::new());
//!
//! Autonomous::new(config.auton.clone()).run(&drivetrain, &mut drive)?;
//! ```
//!
//! ## Modules
//!
//! - [`motion`]: Encoder moves and field routing.
//! - [`peripherals`]: Hardware capabilities and the four-wheel drivetrain.
//! - [`auton`]: The autonomous routine.
//! - [`config`]: JSON robot configuration.
//! - [`telemetry`]: Driver-facing progress frames.
//! - [`sim`]: Deterministic motors, clocks and sessions.
//! - [`fs`]: Filesystem utilities including logging.

/// Autonomous routine module.
///
/// Runs an [`AutonPlan`](auton::AutonPlan), a labelled list of encoder
/// moves, on a [`FourWheel`](peripherals::drivetrain::FourWheel).
pub mod auton;

/// Robot configuration module.
pub mod config;

/// Error types.
pub mod error;

/// Filesystem utilities module.
///
/// Contains the logger that records every move to the console and to a
/// file, which on the robot is the SD card.
pub mod fs;

/// Autonomous motion control module.
///
/// - **Encoder moves**: relative closed-loop moves with timeout and
///   cancellation.
/// - **Routing**: pose tracking and point-and-shoot planning.
pub mod motion;

/// Hardware capabilities module.
///
/// Defines the motor, clock and session traits the motion code runs
/// against, and the four-wheel drivetrain built on them.
pub mod peripherals;

/// Simulated hardware for tests and host runs.
pub mod sim;

/// Telemetry module.
pub mod telemetry;

pub use error::{DriveError, Result};
