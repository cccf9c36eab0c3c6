//! Hardware capabilities the motion code is written against.
//!
//! Nothing in [`motion`](crate::motion) talks to a device directly. Instead
//! it is handed implementations of the traits below:
//!
//! - [`MotorPort`]: one encoder-equipped drive motor.
//! - [`SessionClock`]: an elapsed-time source that can also block.
//! - [`SessionState`]: whether the operator still allows the robot to run.
//!
//! The [`sim`](crate::sim) module provides deterministic implementations for
//! tests and host runs. The `vexide` feature adds V5 smart motor support.
//!
//! # Example
//!
//! ```ignore
//! use autodrive::peripherals::{make_shared, SharedMotor};
//! use autodrive::sim::SimMotor;
//!
//! let left = make_shared(SimMotor::new(40));
//! let handle: SharedMotor = left.clone();
//! ```

use std::{
    cell::RefCell,
    rc::Rc,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use snafu::Snafu;

/// Four-wheel drivetrain and the direction table.
pub mod drivetrain;

/// V5 smart motor backend.
#[cfg(feature = "vexide")]
pub mod v5;

/// A fault reported by a motor port.
///
/// Port faults are fatal to the running routine. Nothing in this crate
/// retries them.
#[derive(Debug, Snafu)]
#[snafu(display("motor port fault: {message}"))]
pub struct PortError {
    message: String,
}

impl PortError {
    /// Creates a port fault carrying a human readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message the port reported.
    pub fn message(&self) -> &str { &self.message }
}

/// Which way a motor counts as "forward".
///
/// Polarity is fixed when the robot is configured. Moves never flip it; the
/// sign of the requested distance carries the direction instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Positive power spins the motor forward and counts up.
    Forward,
    /// Positive power spins the motor in reverse.
    Reverse,
}

impl Polarity {
    /// The opposite polarity.
    pub fn flipped(self) -> Self {
        match self {
            Polarity::Forward => Polarity::Reverse,
            Polarity::Reverse => Polarity::Forward,
        }
    }
}

/// The operating mode of a motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoMode {
    /// Power is a velocity setpoint held with encoder feedback.
    Velocity,
    /// The controller drives toward the target count, capped by power.
    Position,
}

/// One encoder-equipped motor.
///
/// Reads take `&self`, writes take `&mut self`. Every call may fail with a
/// [`PortError`].
pub trait MotorPort {
    /// Sets which rotation counts as forward.
    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), PortError>;

    /// Switches the controller between velocity and position servoing.
    fn set_servo_mode(&mut self, mode: ServoMode) -> Result<(), PortError>;

    /// Sets the absolute encoder count used by [`ServoMode::Position`].
    fn set_target_counts(&mut self, counts: i32) -> Result<(), PortError>;

    /// Sets the power magnitude, a fraction in `[0, 1]` (or `[-1, 1]` in
    /// velocity mode).
    fn set_power(&mut self, power: f64) -> Result<(), PortError>;

    /// Current encoder reading.
    fn position_counts(&self) -> Result<i32, PortError>;

    /// Whether the controller is still moving toward its target.
    fn is_busy(&self) -> Result<bool, PortError>;

    /// Stops the motor and zeroes its encoder.
    fn reset_position(&mut self) -> Result<(), PortError>;
}

/// A motor handle shared between the drivetrain and the motion controllers.
pub type SharedMotor = Rc<RefCell<dyn MotorPort>>;

/// Wraps a motor so it can be shared.
///
/// The concrete handle coerces into a [`SharedMotor`] while the caller keeps
/// typed access to it.
pub fn make_shared<M: MotorPort + 'static>(motor: M) -> Rc<RefCell<M>> {
    Rc::new(RefCell::new(motor))
}

/// Elapsed time for the running session.
pub trait SessionClock {
    /// Restarts the elapsed-time measurement at zero.
    fn reset(&mut self);

    /// Time since the last [`reset`](SessionClock::reset).
    fn elapsed(&self) -> Duration;

    /// Blocks the calling thread.
    fn sleep(&mut self, duration: Duration);

    /// [`elapsed`](SessionClock::elapsed) in seconds.
    fn elapsed_secs(&self) -> f64 { self.elapsed().as_secs_f64() }
}

/// Whether the host still allows the robot to run.
///
/// Checked before every move and once per polling iteration. A `false`
/// answer is the only way to cancel a running move.
pub trait SessionState {
    /// `true` until the operator or host stops the run.
    fn is_active(&self) -> bool;

    /// `true` once the operator has signalled the start of the run.
    ///
    /// Routines poll this after setup and before their first move. Sessions
    /// without a start signal are started from the beginning.
    fn is_started(&self) -> bool { true }
}

impl<F: Fn() -> bool> SessionState for F {
    fn is_active(&self) -> bool { self() }
}

impl SessionState for AtomicBool {
    fn is_active(&self) -> bool { self.load(Ordering::Acquire) }
}

/// Wall-clock [`SessionClock`] for host builds.
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    start: std::time::Instant,
}

impl HostClock {
    /// A clock that starts measuring now.
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self { Self::new() }
}

impl SessionClock for HostClock {
    fn reset(&mut self) { self.start = std::time::Instant::now(); }

    fn elapsed(&self) -> Duration { self.start.elapsed() }

    fn sleep(&mut self, duration: Duration) { std::thread::sleep(duration); }
}
