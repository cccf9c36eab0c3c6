//! Autonomous motion control.
//!
//! This module provides the building blocks for moving the robot during the
//! autonomous period:
//!
//! - **Encoder moves**: Closed-loop relative moves driven by the motor
//!   controllers' own position servos, with timeout, cancellation and a
//!   settle delay.
//! - **Routing**: A field pose tracker and a point-and-shoot planner that
//!   turns field targets into encoder moves.
//!
//! # Architecture
//!
//! Moves are synchronous. A call to
//! [`EncoderDrive::drive`](encoder::EncoderDrive::drive) sets the targets,
//! applies power, and polls until the move ends, checking the session on
//! every iteration so a stop request is honoured promptly.
//!
//! # Example
//!
//! ```ignore
//! use autodrive::motion::{DriveConfig, EncoderDrive, MoveCommand};
//!
//! let mut drive = EncoderDrive::new(DriveConfig::default(), left, right, clock, session, ());
//!
//! drive.drive(&MoveCommand::straight(0.8, 24.0, 5.0)?)?; // Move 24 inches
//! drive.drive(&MoveCommand::spin(0.5, 12.0, 4.0)?)?;     // Spin right
//! ```

/// Encoder-driven relative moves.
///
/// Provides the [`EncoderDrive`](encoder::EncoderDrive) controller and the
/// [`DriveConfig`](encoder::DriveConfig) geometry it converts inches with.
pub mod encoder;

/// Field-relative routing on top of encoder moves.
pub mod route;

pub use encoder::{ArrivalPolicy, DriveConfig, EncoderDrive, MotorTargets, MoveCommand, MoveOutcome};
