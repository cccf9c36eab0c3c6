//! Encoder-driven relative moves.
//!
//! This module converts a requested travel in inches into target encoder
//! counts for the left and right drive references, hands the targets to the
//! motor controllers in position-servo mode, and polls until one of three
//! things happens:
//!
//! 1. the sides arrive (see [`ArrivalPolicy`]),
//! 2. the move runs out of time,
//! 3. the session stops running.
//!
//! Every move is relative to where the encoders read when it starts. The
//! encoders are never reset between moves.
//!
//! # Example
//!
//! ```ignore
//! use autodrive::motion::encoder::{DriveConfig, EncoderDrive, MoveCommand};
//!
//! let mut drive = EncoderDrive::new(DriveConfig::default(), left, right, clock, session, telemetry);
//!
//! drive.drive(&MoveCommand::new(0.8, 48.0, 48.0, 5.0)?)?;   // forward
//! drive.drive(&MoveCommand::new(0.5, 12.0, -12.0, 4.0)?)?;  // spin right
//! drive.drive(&MoveCommand::new(0.8, -24.0, -24.0, 4.0)?)?; // reverse
//! ```

use std::{f64::consts::PI, time::Duration};

use log::{debug, info, warn};
use serde::Deserialize;
use snafu::ensure;

use crate::{
    error::{DriveError, InvalidCommandSnafu, InvalidConfigSnafu, Result},
    peripherals::{PortError, ServoMode, SessionClock, SessionState, SharedMotor},
    telemetry::Telemetry,
};

/// Pause after every move so residual motion dies down.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(250);

/// Sleep between start checks in [`EncoderDrive::wait_for_start`].
pub const START_POLL: Duration = Duration::from_millis(10);

/// Physical drive geometry and the derived encoder scale.
///
/// Built once at startup and never changed. The only way to obtain one is
/// through validation, so `counts_per_inch` is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawDriveConfig")]
pub struct DriveConfig {
    counts_per_motor_rev:  f64,
    gear_reduction:        f64,
    wheel_diameter_inches: f64,
    counts_per_inch:       f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDriveConfig {
    counts_per_motor_rev:  f64,
    gear_reduction:        f64,
    wheel_diameter_inches: f64,
}

impl TryFrom<RawDriveConfig> for DriveConfig {
    type Error = DriveError;

    fn try_from(raw: RawDriveConfig) -> Result<Self> {
        DriveConfig::new(
            raw.counts_per_motor_rev,
            raw.gear_reduction,
            raw.wheel_diameter_inches,
        )
    }
}

impl DriveConfig {
    /// Encoder counts per motor shaft revolution of the reference drive.
    pub const REFERENCE_COUNTS_PER_MOTOR_REV: f64 = 8192.0;
    /// Gear reduction of the reference drive (60 tooth driving 70 tooth).
    pub const REFERENCE_GEAR_REDUCTION: f64 = 60.0 / 70.0;
    /// Wheel diameter of the reference drive (70 mm).
    pub const REFERENCE_WHEEL_DIAMETER_INCHES: f64 = 2.75591;

    /// Validates the geometry and derives the encoder scale.
    ///
    /// # Arguments
    ///
    /// * `counts_per_motor_rev` - Encoder counts per motor shaft revolution.
    /// * `gear_reduction` - Motor revolutions per wheel revolution. Above 1.0
    ///   gears down, below 1.0 gears up.
    /// * `wheel_diameter_inches` - Drive wheel diameter.
    ///
    /// # Errors
    ///
    /// [`DriveError::InvalidConfig`] when any input, or the derived counts
    /// per inch, is not a positive finite number.
    pub fn new(
        counts_per_motor_rev: f64,
        gear_reduction: f64,
        wheel_diameter_inches: f64,
    ) -> Result<Self> {
        positive("counts_per_motor_rev", counts_per_motor_rev)?;
        positive("gear_reduction", gear_reduction)?;
        positive("wheel_diameter_inches", wheel_diameter_inches)?;

        let counts_per_inch =
            (counts_per_motor_rev * gear_reduction) / (wheel_diameter_inches * PI);
        positive("counts_per_inch", counts_per_inch)?;

        Ok(Self {
            counts_per_motor_rev,
            gear_reduction,
            wheel_diameter_inches,
            counts_per_inch,
        })
    }

    /// A configuration with a known scale and no physical geometry.
    ///
    /// Mostly useful for simulation, where "100 counts per inch" is easier
    /// to reason about than a real gearbox.
    ///
    /// # Errors
    ///
    /// [`DriveError::InvalidConfig`] when `counts_per_inch` is not positive.
    pub fn from_counts_per_inch(counts_per_inch: f64) -> Result<Self> {
        // A one inch circumference wheel turns the scale into counts per rev.
        DriveConfig::new(counts_per_inch, 1.0, 1.0 / PI)
    }

    /// The reference drive: 8192 count encoders, 60:70 gearing, 70 mm wheels.
    pub fn reference() -> Self {
        let counts_per_motor_rev = Self::REFERENCE_COUNTS_PER_MOTOR_REV;
        let gear_reduction = Self::REFERENCE_GEAR_REDUCTION;
        let wheel_diameter_inches = Self::REFERENCE_WHEEL_DIAMETER_INCHES;
        Self {
            counts_per_motor_rev,
            gear_reduction,
            wheel_diameter_inches,
            counts_per_inch: (counts_per_motor_rev * gear_reduction) /
                (wheel_diameter_inches * PI),
        }
    }

    /// Encoder counts per motor shaft revolution.
    pub fn counts_per_motor_rev(&self) -> f64 { self.counts_per_motor_rev }

    /// Motor revolutions per wheel revolution.
    pub fn gear_reduction(&self) -> f64 { self.gear_reduction }

    /// Drive wheel diameter in inches.
    pub fn wheel_diameter_inches(&self) -> f64 { self.wheel_diameter_inches }

    /// Encoder counts per inch of wheel travel. Always positive.
    pub fn counts_per_inch(&self) -> f64 { self.counts_per_inch }

    /// Whole encoder counts for a travel distance, rounded to nearest.
    pub fn counts_for(&self, inches: f64) -> i32 { (inches * self.counts_per_inch).round() as i32 }

    /// Travel distance for a number of encoder counts.
    pub fn inches_for(&self, counts: i32) -> f64 { f64::from(counts) / self.counts_per_inch }
}

impl Default for DriveConfig {
    fn default() -> Self { Self::reference() }
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        InvalidConfigSnafu { field, value }
    );
    Ok(())
}

/// One relative move.
///
/// Direction comes from the sign of each side's distance. The speed is a
/// magnitude: its sign is dropped and it is capped at full power.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawMoveCommand")]
pub struct MoveCommand {
    speed:        f64,
    left_inches:  f64,
    right_inches: f64,
    timeout:      Duration,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMoveCommand {
    speed:        f64,
    left_inches:  f64,
    right_inches: f64,
    timeout_secs: f64,
}

impl TryFrom<RawMoveCommand> for MoveCommand {
    type Error = DriveError;

    fn try_from(raw: RawMoveCommand) -> Result<Self> {
        MoveCommand::new(raw.speed, raw.left_inches, raw.right_inches, raw.timeout_secs)
    }
}

impl MoveCommand {
    /// Builds a move from a timeout in seconds.
    ///
    /// # Errors
    ///
    /// [`DriveError::InvalidCommand`] when the timeout is negative, not
    /// finite or too large for a [`Duration`], or when the speed or either
    /// distance is not finite.
    pub fn new(speed: f64, left_inches: f64, right_inches: f64, timeout_secs: f64) -> Result<Self> {
        ensure!(
            timeout_secs.is_finite() && timeout_secs >= 0.0,
            InvalidCommandSnafu {
                reason: "timeout must be a non-negative number of seconds",
            }
        );
        let timeout = Duration::try_from_secs_f64(timeout_secs).map_err(|_| {
            InvalidCommandSnafu {
                reason: "timeout is too large",
            }
            .build()
        })?;
        Self::with_timeout(speed, left_inches, right_inches, timeout)
    }

    /// Builds a move from a [`Duration`] timeout.
    ///
    /// # Errors
    ///
    /// [`DriveError::InvalidCommand`] when the speed or either distance is
    /// not finite.
    pub fn with_timeout(
        speed: f64,
        left_inches: f64,
        right_inches: f64,
        timeout: Duration,
    ) -> Result<Self> {
        ensure!(
            speed.is_finite(),
            InvalidCommandSnafu {
                reason: "speed must be finite",
            }
        );
        ensure!(
            left_inches.is_finite() && right_inches.is_finite(),
            InvalidCommandSnafu {
                reason: "distances must be finite",
            }
        );
        let mut speed = speed.abs();
        if speed > 1.0 {
            warn!("Move speed {} capped at full power", speed);
            speed = 1.0;
        }
        Ok(Self {
            speed,
            left_inches,
            right_inches,
            timeout,
        })
    }

    /// Builds a move from values already known to be valid.
    pub(crate) const fn from_parts(
        speed: f64,
        left_inches: f64,
        right_inches: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            speed,
            left_inches,
            right_inches,
            timeout,
        }
    }

    /// Both sides travel the same distance.
    ///
    /// # Errors
    ///
    /// As for [`MoveCommand::new`].
    pub fn straight(speed: f64, inches: f64, timeout_secs: f64) -> Result<Self> {
        Self::new(speed, inches, inches, timeout_secs)
    }

    /// The sides travel opposite distances. Positive `inches` spins
    /// clockwise (left side forward).
    ///
    /// # Errors
    ///
    /// As for [`MoveCommand::new`].
    pub fn spin(speed: f64, inches: f64, timeout_secs: f64) -> Result<Self> {
        Self::new(speed, inches, -inches, timeout_secs)
    }

    /// Power magnitude in `[0, 1]`.
    pub fn speed(&self) -> f64 { self.speed }

    /// Signed left side travel.
    pub fn left_inches(&self) -> f64 { self.left_inches }

    /// Signed right side travel.
    pub fn right_inches(&self) -> f64 { self.right_inches }

    /// How long the move may poll before giving up.
    pub fn timeout(&self) -> Duration { self.timeout }
}

/// Absolute encoder targets for one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorTargets {
    /// Left reference target in counts.
    pub left:  i32,
    /// Right reference target in counts.
    pub right: i32,
}

impl MotorTargets {
    /// Targets for travelling `left_inches`/`right_inches` from `start`.
    ///
    /// Each side is computed on its own, so unequal distances turn the robot.
    pub fn relative(
        config: &DriveConfig,
        start: (i32, i32),
        left_inches: f64,
        right_inches: f64,
    ) -> Self {
        Self {
            left:  start.0.saturating_add(config.counts_for(left_inches)),
            right: start.1.saturating_add(config.counts_for(right_inches)),
        }
    }
}

/// When a move counts as arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalPolicy {
    /// Stop as soon as either side reaches its target. Shorter cycle times,
    /// with some slop left on the lagging side.
    #[default]
    FirstArrival,
    /// Keep servoing until both sides reach their targets.
    BothArrive,
}

/// Why a move ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The arrival policy was satisfied.
    Reached,
    /// The timeout expired first.
    TimedOut,
    /// The session stopped during the move.
    Cancelled,
    /// The session was already stopped; nothing was commanded.
    Skipped,
}

impl MoveOutcome {
    /// `true` for [`MoveOutcome::Reached`].
    pub fn is_reached(self) -> bool { self == MoveOutcome::Reached }
}

/// The encoder move controller.
///
/// Owns the clock, session and telemetry capabilities it needs, and drives
/// the two reference motors it is given (normally the front pair of a
/// [`FourWheel`](crate::peripherals::drivetrain::FourWheel)). Moves take
/// `&mut self`, so one controller never runs two moves at once.
pub struct EncoderDrive<C, S, T> {
    config:    DriveConfig,
    left:      SharedMotor,
    right:     SharedMotor,
    clock:     C,
    session:   S,
    telemetry: T,
    policy:    ArrivalPolicy,
    settle:    Duration,
}

impl<C: SessionClock, S: SessionState, T: Telemetry> EncoderDrive<C, S, T> {
    /// Creates a controller with first-arrival completion and a 250 ms
    /// settle delay.
    pub fn new(
        config: DriveConfig,
        left: SharedMotor,
        right: SharedMotor,
        clock: C,
        session: S,
        telemetry: T,
    ) -> Self {
        Self {
            config,
            left,
            right,
            clock,
            session,
            telemetry,
            policy: ArrivalPolicy::default(),
            settle: DEFAULT_SETTLE,
        }
    }

    /// Sets when a move counts as arrived.
    pub fn with_policy(mut self, policy: ArrivalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the pause after every move.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// The drive geometry.
    pub fn config(&self) -> &DriveConfig { &self.config }

    /// The arrival policy.
    pub fn policy(&self) -> ArrivalPolicy { self.policy }

    /// The clock.
    pub fn clock(&self) -> &C { &self.clock }

    /// The session.
    pub fn session(&self) -> &S { &self.session }

    /// The telemetry sink.
    pub fn telemetry(&self) -> &T { &self.telemetry }

    /// Mutable access to the telemetry sink, for reporting outside moves.
    pub fn telemetry_mut(&mut self) -> &mut T { &mut self.telemetry }

    /// Whether the session still allows motion.
    pub fn is_active(&self) -> bool { self.session.is_active() }

    /// Blocks until the session signals start.
    ///
    /// Returns `false` without waiting further if the session ends first.
    pub fn wait_for_start(&mut self) -> bool {
        let mut announced = false;
        loop {
            if !self.session.is_active() {
                return false;
            }
            if self.session.is_started() {
                return true;
            }
            if !announced {
                info!("Waiting for start");
                announced = true;
            }
            self.clock.sleep(START_POLL);
        }
    }

    /// Blocks for `duration` on the controller's clock.
    pub fn pause(&mut self, duration: Duration) { self.clock.sleep(duration); }

    /// Current `(left, right)` reference encoder readings.
    ///
    /// # Errors
    ///
    /// [`DriveError::Port`] if either encoder cannot be read.
    pub fn positions(&self) -> Result<(i32, i32)> {
        let left = self.left.borrow().position_counts()?;
        let right = self.right.borrow().position_counts()?;
        Ok((left, right))
    }

    /// Runs one relative move and blocks until it ends.
    ///
    /// When the session is not active the call does nothing and returns
    /// [`MoveOutcome::Skipped`]. Otherwise the targets are set, power is
    /// applied at least once (even with a zero timeout), and on exit both
    /// sides are stopped, returned to velocity mode, and given the settle
    /// delay.
    ///
    /// # Errors
    ///
    /// [`DriveError::Port`] on the first motor fault. Both sides are still
    /// sent a stop before the error is returned.
    pub fn drive(&mut self, command: &MoveCommand) -> Result<MoveOutcome> {
        if !self.session.is_active() {
            debug!("Session inactive, move skipped");
            return Ok(MoveOutcome::Skipped);
        }

        let start = self.positions()?;
        let targets = MotorTargets::relative(
            &self.config,
            start,
            command.left_inches(),
            command.right_inches(),
        );
        debug!(
            "Move from {:?} to {:?} at {:.2} power, {:?} timeout",
            start,
            targets,
            command.speed(),
            command.timeout()
        );

        let servoed = self.servo(&targets, command);
        let stopped = self.stop_sides();
        let outcome = match (servoed, stopped) {
            (Ok(outcome), Ok(())) => outcome,
            (Ok(_), Err(e)) => return Err(e.into()),
            (Err(e), stopped) => {
                if let Err(stop_err) = stopped {
                    warn!("Stop after fault also failed: {}", stop_err);
                }
                return Err(e);
            }
        };

        match outcome {
            MoveOutcome::Reached => info!("Move reached {:?}", targets),
            MoveOutcome::TimedOut => warn!("Move timed out after {:?}", command.timeout()),
            MoveOutcome::Cancelled => warn!("Move cancelled, session stopped"),
            MoveOutcome::Skipped => {}
        }

        self.clock.sleep(self.settle);
        Ok(outcome)
    }

    fn servo(&mut self, targets: &MotorTargets, command: &MoveCommand) -> Result<MoveOutcome> {
        {
            let mut left = self.left.borrow_mut();
            left.set_target_counts(targets.left)?;
            left.set_servo_mode(ServoMode::Position)?;
        }
        {
            let mut right = self.right.borrow_mut();
            right.set_target_counts(targets.right)?;
            right.set_servo_mode(ServoMode::Position)?;
        }

        self.clock.reset();
        self.left.borrow_mut().set_power(command.speed())?;
        self.right.borrow_mut().set_power(command.speed())?;

        loop {
            if !self.session.is_active() {
                return Ok(MoveOutcome::Cancelled);
            }
            if self.clock.elapsed() >= command.timeout() {
                return Ok(MoveOutcome::TimedOut);
            }
            if !self.still_moving()? {
                return Ok(MoveOutcome::Reached);
            }

            let (left, right) = self.positions()?;
            self.telemetry.report(
                "Running to",
                format_args!(" {:7} :{:7}", targets.left, targets.right),
            );
            self.telemetry
                .report("Currently at", format_args!(" at {:7} :{:7}", left, right));
            self.telemetry.flush();
        }
    }

    fn still_moving(&self) -> Result<bool> {
        let left = self.left.borrow();
        let right = self.right.borrow();
        let moving = match self.policy {
            ArrivalPolicy::FirstArrival => left.is_busy()? && right.is_busy()?,
            ArrivalPolicy::BothArrive => left.is_busy()? || right.is_busy()?,
        };
        Ok(moving)
    }

    /// Zeroes power on both sides and leaves them in velocity mode. Both
    /// sides are attempted even if the first fails.
    fn stop_sides(&mut self) -> std::result::Result<(), PortError> {
        let left = stop_side(&self.left);
        let right = stop_side(&self.right);
        left.and(right)
    }
}

fn stop_side(motor: &SharedMotor) -> std::result::Result<(), PortError> {
    let mut motor = motor.borrow_mut();
    let power = motor.set_power(0.0);
    let mode = motor.set_servo_mode(ServoMode::Velocity);
    power.and(mode)
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        peripherals::make_shared,
        sim::{ScriptedSession, SimClock, SimMotor},
        telemetry::BufferedTelemetry,
    };

    type TestDrive = EncoderDrive<SimClock, ScriptedSession, BufferedTelemetry>;

    fn rig(
        left: SimMotor,
        right: SimMotor,
        session: ScriptedSession,
    ) -> (TestDrive, Rc<RefCell<SimMotor>>, Rc<RefCell<SimMotor>>) {
        let left = make_shared(left);
        let right = make_shared(right);
        let drive = EncoderDrive::new(
            DriveConfig::from_counts_per_inch(100.0).unwrap(),
            left.clone(),
            right.clone(),
            SimClock::with_tick(Duration::from_millis(100)),
            session,
            BufferedTelemetry::new(),
        );
        (drive, left, right)
    }

    #[test]
    fn counts_per_inch_is_positive_and_deterministic() {
        for (rev, gear, wheel) in [(8192.0, 60.0 / 70.0, 2.75591), (28.0, 20.0, 4.0), (1.0, 0.1, 10.0)]
        {
            let a = DriveConfig::new(rev, gear, wheel).unwrap();
            let b = DriveConfig::new(rev, gear, wheel).unwrap();
            assert!(a.counts_per_inch() > 0.0);
            assert_eq!(a.counts_per_inch(), b.counts_per_inch());
        }
        let reference = DriveConfig::reference();
        assert!((reference.counts_per_inch() - 811.0).abs() < 0.1);
        assert_eq!(DriveConfig::default(), reference);
    }

    #[test]
    fn non_positive_geometry_is_rejected() {
        assert!(DriveConfig::new(0.0, 1.0, 4.0).is_err());
        assert!(DriveConfig::new(8192.0, -1.0, 4.0).is_err());
        assert!(DriveConfig::new(8192.0, 1.0, f64::NAN).is_err());
        let err = DriveConfig::new(8192.0, 1.0, 0.0).unwrap_err();
        assert!(matches!(
            err,
            DriveError::InvalidConfig {
                field: "wheel_diameter_inches",
                ..
            }
        ));
    }

    #[test]
    fn scale_round_trips() {
        let config = DriveConfig::from_counts_per_inch(100.0).unwrap();
        assert!((config.counts_per_inch() - 100.0).abs() < 1e-9);
        assert_eq!(config.counts_for(1.234), 123);
        assert_eq!(config.counts_for(-0.996), -100);
        assert!((config.inches_for(1200) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let err = MoveCommand::new(0.5, 10.0, 10.0, -1.0).unwrap_err();
        assert!(matches!(err, DriveError::InvalidCommand { .. }));
        assert!(MoveCommand::new(0.5, 10.0, 10.0, f64::INFINITY).is_err());
        assert!(MoveCommand::new(f64::NAN, 10.0, 10.0, 1.0).is_err());
        assert!(MoveCommand::new(0.5, 10.0, 10.0, 0.0).is_ok());
    }

    #[test]
    fn oversized_timeout_is_rejected() {
        let err = MoveCommand::new(0.5, 1.0, 1.0, 1e20).unwrap_err();
        assert!(matches!(err, DriveError::InvalidCommand { .. }));
        assert!(err.to_string().contains("too large"));

        let bad = serde_json::from_str::<MoveCommand>(
            r#"{"speed": 0.5, "left_inches": 1, "right_inches": 1, "timeout_secs": 1e300}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn speed_is_a_capped_magnitude() {
        let cmd = MoveCommand::new(-0.6, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(cmd.speed(), 0.6);
        let cmd = MoveCommand::new(3.0, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(cmd.speed(), 1.0);
    }

    #[test]
    fn straight_and_spin_targets() {
        let config = DriveConfig::from_counts_per_inch(100.0).unwrap();
        let straight = MotorTargets::relative(&config, (0, 0), 10.0, 10.0);
        assert_eq!(straight.left, straight.right);
        assert!(straight.left > 0);

        let spin = MotorTargets::relative(&config, (0, 0), 10.0, -10.0);
        assert_eq!(spin.left, -spin.right);
        assert!(spin.left > 0);
    }

    #[test]
    fn reference_path_targets() {
        let (mut drive, left, right) =
            rig(SimMotor::new(1000), SimMotor::new(1000), ScriptedSession::always());

        let outcome = drive
            .drive(&MoveCommand::new(0.8, 48.0, 48.0, 5.0).unwrap())
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Reached);
        assert_eq!(left.borrow().target(), 4800);
        assert_eq!(right.borrow().target(), 4800);

        let baseline = drive.positions().unwrap();
        drive
            .drive(&MoveCommand::new(0.5, 12.0, -12.0, 4.0).unwrap())
            .unwrap();
        assert_eq!(left.borrow().target(), baseline.0 + 1200);
        assert_eq!(right.borrow().target(), baseline.1 - 1200);
        let expected = format!(" {:7} :{:7}", baseline.0 + 1200, baseline.1 - 1200);
        assert_eq!(drive.telemetry().last("Running to"), Some(expected.as_str()));
    }

    #[test]
    fn moves_are_relative_to_the_current_reading() {
        let (mut drive, left, right) = rig(
            SimMotor::new(50).with_position(-300),
            SimMotor::new(50).with_position(75),
            ScriptedSession::always(),
        );
        drive
            .drive(&MoveCommand::new(1.0, 2.0, 3.0, 5.0).unwrap())
            .unwrap();
        assert_eq!(left.borrow().target(), -100);
        assert_eq!(right.borrow().target(), 375);
    }

    #[test]
    fn zero_move_exits_on_first_check() {
        let (mut drive, left, right) = rig(
            SimMotor::new(100).with_position(42),
            SimMotor::new(100).with_position(-7),
            ScriptedSession::always(),
        );
        let outcome = drive
            .drive(&MoveCommand::new(0.5, 0.0, 0.0, 3.0).unwrap())
            .unwrap();

        assert_eq!(outcome, MoveOutcome::Reached);
        assert_eq!(left.borrow().target(), 42);
        assert_eq!(right.borrow().target(), -7);
        assert_eq!(left.borrow().busy_queries(), 1);
        assert_eq!(drive.telemetry().frame_count(), 0);
    }

    #[test]
    fn stuck_motors_time_out_with_power_off() {
        let (mut drive, left, right) =
            rig(SimMotor::stuck(), SimMotor::stuck(), ScriptedSession::always());
        let outcome = drive
            .drive(&MoveCommand::new(0.7, 10.0, 10.0, 2.0).unwrap())
            .unwrap();

        assert_eq!(outcome, MoveOutcome::TimedOut);
        assert!(drive.clock().now() >= Duration::from_secs(2));
        for motor in [&left, &right] {
            let motor = motor.borrow();
            assert_eq!(motor.power(), 0.0);
            assert_eq!(motor.mode(), ServoMode::Velocity);
            assert!(motor.powers().contains(&0.7));
        }
        assert_eq!(drive.clock().slept(), DEFAULT_SETTLE);
    }

    #[test]
    fn zero_timeout_still_pulses_power() {
        let (mut drive, left, _right) =
            rig(SimMotor::stuck(), SimMotor::stuck(), ScriptedSession::always());
        let outcome = drive
            .drive(&MoveCommand::new(0.4, 10.0, 10.0, 0.0).unwrap())
            .unwrap();

        assert_eq!(outcome, MoveOutcome::TimedOut);
        assert_eq!(left.borrow().powers(), &[0.4, 0.0]);
        assert_eq!(left.borrow().busy_queries(), 0);
    }

    #[test]
    fn cancellation_ends_within_one_iteration() {
        // One check before the move, then three polling iterations.
        let (mut drive, left, right) = rig(
            SimMotor::new(1),
            SimMotor::new(1),
            ScriptedSession::active_for(4),
        );
        let outcome = drive
            .drive(&MoveCommand::new(0.5, 10.0, 10.0, 30.0).unwrap())
            .unwrap();

        assert_eq!(outcome, MoveOutcome::Cancelled);
        assert_eq!(left.borrow().busy_queries(), 3);
        assert_eq!(left.borrow().power(), 0.0);
        assert_eq!(right.borrow().power(), 0.0);
    }

    #[test]
    fn inactive_session_is_a_no_op() {
        let (mut drive, left, _right) =
            rig(SimMotor::new(10), SimMotor::new(10), ScriptedSession::inactive());
        let outcome = drive
            .drive(&MoveCommand::new(0.5, 10.0, 10.0, 3.0).unwrap())
            .unwrap();

        assert_eq!(outcome, MoveOutcome::Skipped);
        let left = left.borrow();
        assert!(left.powers().is_empty());
        assert_eq!(left.target(), 0);
        assert_eq!(left.mode(), ServoMode::Velocity);
        assert_eq!(drive.clock().slept(), Duration::ZERO);
    }

    #[test]
    fn first_arrival_ends_the_move() {
        // Left covers 10 inches in 10 polls (1 s), right needs 100 polls.
        let (mut drive, left, right) =
            rig(SimMotor::new(100), SimMotor::new(10), ScriptedSession::always());
        let outcome = drive
            .drive(&MoveCommand::new(1.0, 10.0, 10.0, 5.0).unwrap())
            .unwrap();

        assert_eq!(outcome, MoveOutcome::Reached);
        assert_eq!(left.borrow().position(), 1000);
        assert!(right.borrow().position() < 1000);
        assert_eq!(drive.clock().now(), Duration::from_secs(1) + DEFAULT_SETTLE);
        assert_eq!(left.borrow().power(), 0.0);
        assert_eq!(right.borrow().power(), 0.0);
    }

    #[test]
    fn both_arrive_waits_for_the_slow_side() {
        let (drive, left, right) =
            rig(SimMotor::new(100), SimMotor::new(50), ScriptedSession::always());
        let mut drive = drive.with_policy(ArrivalPolicy::BothArrive);
        let outcome = drive
            .drive(&MoveCommand::new(1.0, 10.0, 10.0, 5.0).unwrap())
            .unwrap();

        assert_eq!(outcome, MoveOutcome::Reached);
        assert_eq!(left.borrow().position(), 1000);
        assert_eq!(right.borrow().position(), 1000);
    }

    #[test]
    fn port_fault_still_stops_the_other_side() {
        let (mut drive, left, right) = rig(
            SimMotor::new(10),
            SimMotor::new(10).failing_after(3, "right encoder unplugged"),
            ScriptedSession::always(),
        );
        let err = drive
            .drive(&MoveCommand::new(0.5, 10.0, 10.0, 5.0).unwrap())
            .unwrap_err();

        assert!(matches!(err, DriveError::Port { .. }));
        assert_eq!(left.borrow().power(), 0.0);
        assert_eq!(left.borrow().mode(), ServoMode::Velocity);
        assert!(right.borrow().power() > 0.0);
    }

    #[test]
    fn start_wait_sleeps_until_signalled() {
        let (mut drive, left, _right) = rig(
            SimMotor::new(10),
            SimMotor::new(10),
            ScriptedSession::always().starting_after(3),
        );
        assert!(drive.wait_for_start());
        assert_eq!(drive.clock().slept(), START_POLL * 3);
        assert!(left.borrow().powers().is_empty());

        let (mut drive, ..) = rig(
            SimMotor::new(10),
            SimMotor::new(10),
            ScriptedSession::active_for(2).starting_after(10),
        );
        assert!(!drive.wait_for_start());
        assert_eq!(drive.clock().slept(), START_POLL * 2);
    }

    #[test]
    fn settle_delay_is_configurable() {
        let (drive, _left, _right) =
            rig(SimMotor::new(100), SimMotor::new(100), ScriptedSession::always());
        let mut drive = drive.with_settle(Duration::from_millis(10));
        drive
            .drive(&MoveCommand::new(1.0, 1.0, 1.0, 5.0).unwrap())
            .unwrap();
        assert_eq!(drive.clock().slept(), Duration::from_millis(10));
    }

    #[test]
    fn commands_deserialize_with_validation() {
        let cmd: MoveCommand = serde_json::from_str(
            r#"{"speed": 0.8, "left_inches": 48, "right_inches": 48, "timeout_secs": 5}"#,
        )
        .unwrap();
        assert_eq!(cmd.timeout(), Duration::from_secs(5));

        let bad = serde_json::from_str::<MoveCommand>(
            r#"{"speed": 0.8, "left_inches": 48, "right_inches": 48, "timeout_secs": -5}"#,
        );
        assert!(bad.is_err());
    }
}
