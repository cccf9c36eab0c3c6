//! Deterministic stand-ins for the hardware capabilities.
//!
//! Nothing here reads a real clock or a real device, so a move run against
//! these types produces the same result every time:
//!
//! - [`SimMotor`] travels a fixed number of counts toward its target each
//!   time it is asked whether it is busy.
//! - [`SimClock`] advances a fixed tick each time elapsed time is read, and
//!   jumps forward on sleep.
//! - [`ScriptedSession`] stays active for a set number of checks.
//!
//! # Example
//!
//! ```ignore
//! use autodrive::sim::{ScriptedSession, SimClock, SimMotor};
//!
//! let left = make_shared(SimMotor::new(400));
//! let clock = SimClock::with_tick(Duration::from_millis(5));
//! let session = ScriptedSession::always();
//! ```

use std::{cell::Cell, time::Duration};

use crate::peripherals::{MotorPort, Polarity, PortError, ServoMode, SessionClock, SessionState};

/// A simulated encoder motor.
#[derive(Debug)]
pub struct SimMotor {
    position:        Cell<i32>,
    target:          i32,
    mode:            ServoMode,
    power:           f64,
    powers:          Vec<f64>,
    polarity:        Polarity,
    counts_per_poll: i32,
    busy_queries:    Cell<u32>,
    resets:          u32,
    fail_after:      Option<u32>,
    fault:           String,
    tripped:         Cell<bool>,
}

impl SimMotor {
    /// A motor covering `counts_per_poll` counts per busy query at full
    /// power. Lower power covers proportionally less, never below one count.
    pub fn new(counts_per_poll: i32) -> Self {
        Self {
            position: Cell::new(0),
            target: 0,
            mode: ServoMode::Velocity,
            power: 0.0,
            powers: Vec::new(),
            polarity: Polarity::Forward,
            counts_per_poll: counts_per_poll.max(0),
            busy_queries: Cell::new(0),
            resets: 0,
            fail_after: None,
            fault: String::new(),
            tripped: Cell::new(false),
        }
    }

    /// A motor that never moves, so it stays busy forever once given a
    /// distant target.
    pub fn stuck() -> Self { Self::new(0) }

    /// Starts the encoder at `counts`.
    pub fn with_position(self, counts: i32) -> Self {
        self.position.set(counts);
        self
    }

    /// Answers `queries` busy checks, then faults on every later call.
    pub fn failing_after(mut self, queries: u32, fault: impl Into<String>) -> Self {
        self.fail_after = Some(queries);
        self.fault = fault.into();
        self
    }

    /// Current encoder reading.
    pub fn position(&self) -> i32 { self.position.get() }

    /// Last commanded target.
    pub fn target(&self) -> i32 { self.target }

    /// Current mode.
    pub fn mode(&self) -> ServoMode { self.mode }

    /// Last commanded power.
    pub fn power(&self) -> f64 { self.power }

    /// Every power ever commanded, oldest first.
    pub fn powers(&self) -> &[f64] { &self.powers }

    /// Current polarity.
    pub fn polarity(&self) -> Polarity { self.polarity }

    /// Number of busy checks answered.
    pub fn busy_queries(&self) -> u32 { self.busy_queries.get() }

    /// Number of encoder resets.
    pub fn resets(&self) -> u32 { self.resets }

    fn check(&self) -> Result<(), PortError> {
        if self.tripped.get() {
            return Err(PortError::new(self.fault.clone()));
        }
        Ok(())
    }

    fn step(&self) -> i32 {
        if self.counts_per_poll == 0 || self.power == 0.0 {
            return 0;
        }
        ((f64::from(self.counts_per_poll) * self.power.abs()).round() as i32).max(1)
    }
}

impl MotorPort for SimMotor {
    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), PortError> {
        self.check()?;
        self.polarity = polarity;
        Ok(())
    }

    fn set_servo_mode(&mut self, mode: ServoMode) -> Result<(), PortError> {
        self.check()?;
        self.mode = mode;
        Ok(())
    }

    fn set_target_counts(&mut self, counts: i32) -> Result<(), PortError> {
        self.check()?;
        self.target = counts;
        Ok(())
    }

    fn set_power(&mut self, power: f64) -> Result<(), PortError> {
        self.check()?;
        self.power = power;
        self.powers.push(power);
        Ok(())
    }

    fn position_counts(&self) -> Result<i32, PortError> {
        self.check()?;
        Ok(self.position.get())
    }

    fn is_busy(&self) -> Result<bool, PortError> {
        self.check()?;
        let queries = self.busy_queries.get() + 1;
        self.busy_queries.set(queries);
        if self.fail_after.is_some_and(|limit| queries > limit) {
            self.tripped.set(true);
            return Err(PortError::new(self.fault.clone()));
        }

        if self.mode != ServoMode::Position {
            return Ok(false);
        }
        let position = self.position.get();
        let remaining = self.target - position;
        let travel = remaining.signum() * remaining.abs().min(self.step());
        self.position.set(position + travel);
        Ok(self.position.get() != self.target)
    }

    fn reset_position(&mut self) -> Result<(), PortError> {
        self.check()?;
        self.position.set(0);
        self.target = 0;
        self.power = 0.0;
        self.resets += 1;
        Ok(())
    }
}

/// A virtual clock.
#[derive(Debug)]
pub struct SimClock {
    now:    Cell<Duration>,
    origin: Duration,
    tick:   Duration,
    slept:  Duration,
}

impl SimClock {
    /// A clock advancing one millisecond per read.
    pub fn new() -> Self { Self::with_tick(Duration::from_millis(1)) }

    /// A clock advancing `tick` per read.
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            origin: Duration::ZERO,
            tick,
            slept: Duration::ZERO,
        }
    }

    /// Virtual time since the clock was created, without advancing it.
    pub fn now(&self) -> Duration { self.now.get() }

    /// Total time spent in [`SessionClock::sleep`].
    pub fn slept(&self) -> Duration { self.slept }
}

impl Default for SimClock {
    fn default() -> Self { Self::new() }
}

impl SessionClock for SimClock {
    fn reset(&mut self) { self.origin = self.now.get(); }

    fn elapsed(&self) -> Duration {
        let now = self.now.get() + self.tick;
        self.now.set(now);
        now - self.origin
    }

    fn sleep(&mut self, duration: Duration) {
        self.now.set(self.now.get() + duration);
        self.slept += duration;
    }
}

/// A session that ends after a scripted number of checks.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    remaining:   Cell<Option<u32>>,
    checks:      Cell<u32>,
    until_start: Cell<u32>,
}

impl ScriptedSession {
    /// Never ends.
    pub fn always() -> Self { Self::default() }

    /// Already ended.
    pub fn inactive() -> Self { Self::active_for(0) }

    /// Answers `true` to the first `checks` checks, `false` afterwards.
    pub fn active_for(checks: u32) -> Self {
        Self {
            remaining: Cell::new(Some(checks)),
            ..Self::default()
        }
    }

    /// Answers `false` to the first `checks` start checks.
    pub fn starting_after(self, checks: u32) -> Self {
        self.until_start.set(checks);
        self
    }

    /// Ends the session now.
    pub fn stop(&self) { self.remaining.set(Some(0)); }

    /// Number of checks answered.
    pub fn checks(&self) -> u32 { self.checks.get() }
}

impl SessionState for ScriptedSession {
    fn is_active(&self) -> bool {
        self.checks.set(self.checks.get() + 1);
        match self.remaining.get() {
            None => true,
            Some(0) => false,
            Some(n) => {
                self.remaining.set(Some(n - 1));
                true
            }
        }
    }

    fn is_started(&self) -> bool {
        match self.until_start.get() {
            0 => true,
            n => {
                self.until_start.set(n - 1);
                false
            }
        }
    }
}
