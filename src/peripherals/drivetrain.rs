//! Four-wheel drivetrain control.
//!
//! This module provides the [`FourWheel`] struct for a robot with one motor
//! per corner. The front pair double as the encoder references for
//! [`EncoderDrive`](crate::motion::encoder::EncoderDrive); all four wheels
//! take part in open-loop moves driven through the [`DirectionTable`].
//!
//! # Direction table
//!
//! Each [`Heading`] maps to one [`WheelCommand`] per wheel: an optional
//! polarity override and a power fraction. The default table is the classic
//! mecanum layout: all wheels for forward/backward, crossed polarities for
//! strafing, and one diagonal pair for diagonal travel.
//!
//! # Example
//!
//! ```ignore
//! use autodrive::peripherals::drivetrain::{FourWheel, Heading};
//!
//! let drivetrain = FourWheel::new(front_left, front_right, back_left, back_right);
//! drivetrain.configure()?;
//!
//! // Strafe right at half power for 1.5 s, then stop.
//! drivetrain.drive_for(Heading::Right, 0.5, Duration::from_millis(1500), &mut clock, &session)?;
//! ```

use std::time::Duration;

use log::{debug, info, warn};

use crate::{
    error::Result,
    motion::encoder::MoveOutcome,
    peripherals::{Polarity, PortError, ServoMode, SessionClock, SessionState, SharedMotor},
};

/// A wheel position on the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    /// Front left.
    FrontLeft,
    /// Front right.
    FrontRight,
    /// Back left.
    BackLeft,
    /// Back right.
    BackRight,
}

impl Wheel {
    /// Every wheel, in table order.
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::BackLeft,
        Wheel::BackRight,
    ];

    fn index(self) -> usize {
        match self {
            Wheel::FrontLeft => 0,
            Wheel::FrontRight => 1,
            Wheel::BackLeft => 2,
            Wheel::BackRight => 3,
        }
    }
}

/// A robot-relative travel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    /// Straight ahead.
    Forward,
    /// Straight back.
    Backward,
    /// Strafe left.
    Left,
    /// Strafe right.
    Right,
    /// Forward and to the left.
    DiagonalForwardLeft,
    /// Forward and to the right.
    DiagonalForwardRight,
    /// Backward and to the left.
    DiagonalBackwardLeft,
    /// Backward and to the right.
    DiagonalBackwardRight,
}

impl Heading {
    /// Every heading, in table order.
    pub const ALL: [Heading; 8] = [
        Heading::Forward,
        Heading::Backward,
        Heading::Left,
        Heading::Right,
        Heading::DiagonalForwardLeft,
        Heading::DiagonalForwardRight,
        Heading::DiagonalBackwardLeft,
        Heading::DiagonalBackwardRight,
    ];

    fn index(self) -> usize {
        match self {
            Heading::Forward => 0,
            Heading::Backward => 1,
            Heading::Left => 2,
            Heading::Right => 3,
            Heading::DiagonalForwardLeft => 4,
            Heading::DiagonalForwardRight => 5,
            Heading::DiagonalBackwardLeft => 6,
            Heading::DiagonalBackwardRight => 7,
        }
    }
}

/// What one wheel does for a heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelCommand {
    /// Polarity to apply first. `None` leaves the wheel's polarity alone.
    pub polarity: Option<Polarity>,
    /// Power fraction in `[0, 1]`, scaled by the caller's power.
    pub power:    f64,
}

impl WheelCommand {
    /// Drive the wheel with `polarity` at `power`.
    pub const fn drive(polarity: Polarity, power: f64) -> Self {
        Self {
            polarity: Some(polarity),
            power,
        }
    }

    /// Leave the wheel unpowered.
    pub const fn idle() -> Self {
        Self {
            polarity: None,
            power:    0.0,
        }
    }
}

/// Per-heading wheel commands.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionTable {
    entries: [[WheelCommand; 4]; 8],
}

impl DirectionTable {
    /// The commands for `heading`, in [`Wheel::ALL`] order.
    pub fn get(&self, heading: Heading) -> [WheelCommand; 4] { self.entries[heading.index()] }

    /// Replaces the commands for `heading`.
    pub fn set(&mut self, heading: Heading, commands: [WheelCommand; 4]) {
        self.entries[heading.index()] = commands;
    }

    /// The command for one wheel under `heading`.
    pub fn wheel(&self, heading: Heading, wheel: Wheel) -> WheelCommand {
        self.entries[heading.index()][wheel.index()]
    }
}

impl Default for DirectionTable {
    /// The mecanum layout, every active wheel at full power.
    fn default() -> Self {
        use Polarity::{Forward as F, Reverse as R};
        let on = |p| WheelCommand::drive(p, 1.0);
        let off = WheelCommand::idle();
        Self {
            entries: [
                // front left, front right, back left, back right
                [on(R), on(F), on(R), on(F)], // forward
                [on(F), on(R), on(F), on(R)], // backward
                [on(R), on(F), on(F), on(R)], // left
                [on(F), on(R), on(R), on(F)], // right
                [off, on(F), on(F), off],     // diagonal forward left
                [on(F), off, off, on(F)],     // diagonal forward right
                [on(R), off, off, on(R)],     // diagonal backward left
                [off, on(R), on(R), off],     // diagonal backward right
            ],
        }
    }
}

/// A four-motor drivetrain.
///
/// Motor handles are shared, so the same front motors can be given to an
/// [`EncoderDrive`](crate::motion::encoder::EncoderDrive).
#[derive(Clone)]
pub struct FourWheel {
    wheels: [SharedMotor; 4],
    base:   [Polarity; 4],
    table:  DirectionTable,
}

impl FourWheel {
    /// Creates a drivetrain with the left side reversed and the right side
    /// forward, which makes positive power drive the robot forward on a
    /// direct-drive chassis.
    pub fn new(
        front_left: SharedMotor,
        front_right: SharedMotor,
        back_left: SharedMotor,
        back_right: SharedMotor,
    ) -> Self {
        Self {
            wheels: [front_left, front_right, back_left, back_right],
            base:   [
                Polarity::Reverse,
                Polarity::Forward,
                Polarity::Reverse,
                Polarity::Forward,
            ],
            table:  DirectionTable::default(),
        }
    }

    /// Overrides the base polarity, in [`Wheel::ALL`] order.
    pub fn with_base_polarity(mut self, base: [Polarity; 4]) -> Self {
        self.base = base;
        self
    }

    /// Overrides the direction table.
    pub fn with_table(mut self, table: DirectionTable) -> Self {
        self.table = table;
        self
    }

    /// The handle for one wheel.
    pub fn motor(&self, wheel: Wheel) -> SharedMotor { self.wheels[wheel.index()].clone() }

    /// The left encoder reference (front left).
    pub fn left_reference(&self) -> SharedMotor { self.motor(Wheel::FrontLeft) }

    /// The right encoder reference (front right).
    pub fn right_reference(&self) -> SharedMotor { self.motor(Wheel::FrontRight) }

    /// The direction table in use.
    pub fn table(&self) -> &DirectionTable { &self.table }

    /// Prepares the drivetrain for a run: applies the base polarity, zeroes
    /// every encoder, and leaves every wheel in velocity mode.
    ///
    /// # Errors
    ///
    /// [`DriveError::Port`](crate::error::DriveError::Port) on the first
    /// motor fault.
    pub fn configure(&self) -> Result<()> {
        for (motor, polarity) in self.wheels.iter().zip(self.base) {
            let mut motor = motor.borrow_mut();
            motor.set_polarity(polarity)?;
            motor.reset_position()?;
            motor.set_servo_mode(ServoMode::Velocity)?;
        }
        let (left, right) = self.positions()?;
        info!("Drivetrain configured, encoders at {} : {}", left, right);
        Ok(())
    }

    /// Current `(left, right)` reference encoder readings.
    ///
    /// # Errors
    ///
    /// [`DriveError::Port`](crate::error::DriveError::Port) if either
    /// encoder cannot be read.
    pub fn positions(&self) -> Result<(i32, i32)> {
        let left = self.wheels[0].borrow().position_counts()?;
        let right = self.wheels[1].borrow().position_counts()?;
        Ok((left, right))
    }

    /// Zeroes power on every wheel. All four are attempted; the first fault
    /// is returned.
    ///
    /// # Errors
    ///
    /// [`DriveError::Port`](crate::error::DriveError::Port) if any wheel
    /// rejects the stop.
    pub fn stop(&self) -> Result<()> {
        let mut first: Option<PortError> = None;
        for motor in &self.wheels {
            if let Err(e) = motor.borrow_mut().set_power(0.0) {
                warn!("Wheel stop failed: {}", e);
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Reapplies the base polarity to every wheel.
    ///
    /// # Errors
    ///
    /// [`DriveError::Port`](crate::error::DriveError::Port) on the first
    /// motor fault.
    pub fn restore_polarity(&self) -> Result<()> {
        for (motor, polarity) in self.wheels.iter().zip(self.base) {
            motor.borrow_mut().set_polarity(polarity)?;
        }
        Ok(())
    }

    /// Starts open-loop travel toward `heading` and returns immediately.
    ///
    /// Each wheel gets its table polarity (if any) and its table power
    /// scaled by `|power|`. Both `|power|` and the scaled result are kept
    /// within `[0, 1]`. The robot keeps moving until
    /// [`stop`](FourWheel::stop) is called; prefer
    /// [`drive_for`](FourWheel::drive_for).
    ///
    /// # Errors
    ///
    /// [`DriveError::Port`](crate::error::DriveError::Port) on the first
    /// motor fault.
    pub fn apply(&self, heading: Heading, power: f64) -> Result<()> {
        let scale = if power.is_finite() { power.abs().min(1.0) } else { 0.0 };
        for (motor, command) in self.wheels.iter().zip(self.table.get(heading)) {
            let mut motor = motor.borrow_mut();
            if let Some(polarity) = command.polarity {
                motor.set_polarity(polarity)?;
            }
            motor.set_power((command.power * scale).clamp(0.0, 1.0))?;
        }
        debug!("Open-loop {:?} at {:.2}", heading, scale);
        Ok(())
    }

    /// Travels toward `heading` for `duration`, then stops every wheel and
    /// restores the base polarity.
    ///
    /// Returns [`MoveOutcome::Reached`] once the duration has elapsed,
    /// [`MoveOutcome::Cancelled`] if the session stopped first, and
    /// [`MoveOutcome::Skipped`] if the session was already stopped.
    ///
    /// # Errors
    ///
    /// [`DriveError::Port`](crate::error::DriveError::Port) on the first
    /// motor fault. The wheels are still sent a stop.
    pub fn drive_for<C: SessionClock, S: SessionState>(
        &self,
        heading: Heading,
        power: f64,
        duration: Duration,
        clock: &mut C,
        session: &S,
    ) -> Result<MoveOutcome> {
        if !session.is_active() {
            return Ok(MoveOutcome::Skipped);
        }

        clock.reset();
        let outcome = self.apply(heading, power).map(|()| {
            loop {
                if !session.is_active() {
                    break MoveOutcome::Cancelled;
                }
                if clock.elapsed() >= duration {
                    break MoveOutcome::Reached;
                }
            }
        });

        let stopped = self.stop().and_then(|()| self.restore_polarity());
        let outcome = match (outcome, stopped) {
            (Ok(outcome), Ok(())) => outcome,
            (Err(e), _) | (Ok(_), Err(e)) => return Err(e),
        };
        info!("Open-loop {:?} ended: {:?}", heading, outcome);
        Ok(outcome)
    }
}
