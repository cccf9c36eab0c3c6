//! V5 smart motor backend.
//!
//! Only built with the `vexide` feature, which needs the `armv7a-vex-v5`
//! target.
//!
//! # Example
//!
//! ```ignore
//! use autodrive::peripherals::{drivetrain::FourWheel, make_shared, v5::{V5Clock, V5Motor}};
//! use vexide::prelude::*;
//!
//! #[vexide::main]
//! async fn main(peripherals: Peripherals) {
//!     let motor = |port| make_shared(V5Motor::new(Motor::new(port, Gearset::Green, Direction::Forward)));
//!     let drivetrain = FourWheel::new(
//!         motor(peripherals.port_1),
//!         motor(peripherals.port_2),
//!         motor(peripherals.port_3),
//!         motor(peripherals.port_4),
//!     );
//!     let clock = V5Clock::new();
//! }
//! ```

use std::{f64::consts::TAU, time::Duration};

use log::warn;
use vexide::{
    math::Angle,
    smart::motor::{Direction, Motor, MotorError},
    time::user_uptime,
};

use super::{MotorPort, Polarity, PortError, ServoMode, SessionClock};

/// Counts from the target at which a position move is treated as arrived.
pub const DEFAULT_TOLERANCE_COUNTS: i32 = 5;

impl From<MotorError> for PortError {
    fn from(err: MotorError) -> Self { PortError::new(err.to_string()) }
}

/// A V5 smart motor behind [`MotorPort`].
///
/// Encoder counts are the gearset's native ticks. Power maps to a fraction
/// of the gearset's maximum RPM.
pub struct V5Motor {
    motor:     Motor,
    mode:      ServoMode,
    target:    i32,
    power:     f64,
    tolerance: i32,
}

impl V5Motor {
    /// Wraps a motor, starting in velocity mode.
    pub fn new(motor: Motor) -> Self {
        Self {
            motor,
            mode: ServoMode::Velocity,
            target: 0,
            power: 0.0,
            tolerance: DEFAULT_TOLERANCE_COUNTS,
        }
    }

    /// Sets how close to the target counts as arrived.
    pub fn with_tolerance(mut self, counts: i32) -> Self {
        self.tolerance = counts.abs();
        self
    }

    /// The wrapped motor.
    pub fn motor(&self) -> &Motor { &self.motor }

    fn ticks_per_rev(&self) -> Result<f64, PortError> {
        Ok(f64::from(self.motor.gearset()?.ticks_per_revolution()))
    }

    fn rpm(&self, power: f64) -> Result<i32, PortError> {
        Ok((power.clamp(-1.0, 1.0) * self.motor.gearset()?.max_rpm()).round() as i32)
    }

    /// Sends the stored mode, target and power to the motor.
    fn command(&mut self) -> Result<(), PortError> {
        match self.mode {
            ServoMode::Velocity => {
                let rpm = self.rpm(self.power)?;
                self.motor.set_velocity(rpm)?;
            }
            ServoMode::Position if self.power == 0.0 => self.motor.set_velocity(0)?,
            ServoMode::Position => {
                let position = counts_to_angle(self.target, self.ticks_per_rev()?);
                let rpm = self.rpm(self.power.abs())?;
                self.motor.set_position_target(position, rpm)?;
            }
        }
        Ok(())
    }
}

impl MotorPort for V5Motor {
    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), PortError> {
        let direction = match polarity {
            Polarity::Forward => Direction::Forward,
            Polarity::Reverse => Direction::Reverse,
        };
        self.motor.set_direction(direction)?;
        Ok(())
    }

    fn set_servo_mode(&mut self, mode: ServoMode) -> Result<(), PortError> {
        self.mode = mode;
        self.command()
    }

    fn set_target_counts(&mut self, counts: i32) -> Result<(), PortError> {
        self.target = counts;
        Ok(())
    }

    fn set_power(&mut self, power: f64) -> Result<(), PortError> {
        self.power = power;
        self.command()
    }

    fn position_counts(&self) -> Result<i32, PortError> {
        let position = self.motor.position()?;
        Ok(angle_to_counts(position, self.ticks_per_rev()?))
    }

    fn is_busy(&self) -> Result<bool, PortError> {
        if self.mode != ServoMode::Position {
            return Ok(false);
        }
        let remaining = self.target.saturating_sub(self.position_counts()?);
        Ok(remaining.abs() > self.tolerance)
    }

    fn reset_position(&mut self) -> Result<(), PortError> {
        if let Err(e) = self.motor.set_velocity(0) {
            warn!("Motor stop before reset failed: {}", e);
        }
        self.motor.reset_position()?;
        self.target = 0;
        self.power = 0.0;
        Ok(())
    }
}

fn counts_to_angle(counts: i32, ticks_per_rev: f64) -> Angle {
    Angle::from_radians(f64::from(counts) / ticks_per_rev * TAU)
}

fn angle_to_counts(angle: Angle, ticks_per_rev: f64) -> i32 {
    (angle.as_radians() / TAU * ticks_per_rev).round() as i32
}

/// [`SessionClock`] on the V5 user program uptime.
///
/// [`sleep`](SessionClock::sleep) spins on the uptime counter, since moves
/// run synchronously.
#[derive(Debug, Clone, Copy)]
pub struct V5Clock {
    start: Duration,
}

impl V5Clock {
    /// A clock that starts measuring now.
    pub fn new() -> Self { Self { start: user_uptime() } }
}

impl Default for V5Clock {
    fn default() -> Self { Self::new() }
}

impl SessionClock for V5Clock {
    fn reset(&mut self) { self.start = user_uptime(); }

    fn elapsed(&self) -> Duration { user_uptime().saturating_sub(self.start) }

    fn sleep(&mut self, duration: Duration) {
        let deadline = user_uptime() + duration;
        while user_uptime() < deadline {
            std::hint::spin_loop();
        }
    }
}
