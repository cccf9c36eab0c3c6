//! The autonomous routine.
//!
//! A routine is a list of labelled legs, each one relative encoder move. The
//! plan is data, so it can be loaded from the robot configuration instead of
//! being recompiled for every match.
//!
//! # Example
//!
//! ```ignore
//! use autodrive::auton::{AutonPlan, Autonomous};
//!
//! let routine = Autonomous::new(AutonPlan::default());
//! let outcomes = routine.run(&drivetrain, &mut drive)?;
//! ```

use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;

use crate::{
    error::Result,
    motion::encoder::{EncoderDrive, MoveCommand, MoveOutcome},
    peripherals::{drivetrain::FourWheel, SessionClock, SessionState},
    telemetry::Telemetry,
};

/// One step of a routine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Leg {
    /// Shown in logs.
    pub label:   String,
    /// The move itself.
    #[serde(rename = "move")]
    pub command: MoveCommand,
}

impl Leg {
    /// Creates a labelled leg.
    pub fn new(label: impl Into<String>, command: MoveCommand) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }
}

/// An ordered list of legs plus the pause after the last one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutonPlan {
    /// Legs, run in order.
    pub legs:           Vec<Leg>,
    /// Pause after the routine so the final telemetry stays readable.
    pub final_pause_ms: u64,
}

impl AutonPlan {
    /// The final pause as a [`Duration`].
    pub fn final_pause(&self) -> Duration { Duration::from_millis(self.final_pause_ms) }
}

impl Default for AutonPlan {
    /// Forward 48 inches, spin right 12 inches per side, reverse 24 inches.
    fn default() -> Self {
        Self {
            legs:           vec![
                Leg::new(
                    "Forward 48",
                    MoveCommand::from_parts(0.8, 48.0, 48.0, Duration::from_secs(5)),
                ),
                Leg::new(
                    "Turn right 12",
                    MoveCommand::from_parts(0.5, 12.0, -12.0, Duration::from_secs(4)),
                ),
                Leg::new(
                    "Reverse 24",
                    MoveCommand::from_parts(0.8, -24.0, -24.0, Duration::from_secs(4)),
                ),
            ],
            final_pause_ms: 1000,
        }
    }
}

/// Runs an [`AutonPlan`] on a drivetrain.
#[derive(Debug, Clone, Default)]
pub struct Autonomous {
    plan: AutonPlan,
}

impl Autonomous {
    /// Creates a routine from a plan.
    pub fn new(plan: AutonPlan) -> Self { Self { plan } }

    /// The plan this routine runs.
    pub fn plan(&self) -> &AutonPlan { &self.plan }

    /// Runs every leg in order and returns one outcome per leg.
    ///
    /// The drivetrain is configured first, which zeroes the encoders, and
    /// the routine then holds until the session signals start. Legs that
    /// time out do not stop the routine. Once the session ends, every
    /// remaining leg is [`MoveOutcome::Skipped`] and the final pause is left
    /// out.
    ///
    /// # Arguments
    ///
    /// * `drivetrain` - The four drive motors; configured before the first leg.
    /// * `drive` - A move controller built on the drivetrain's reference pair.
    ///
    /// # Errors
    ///
    /// The first motor fault ends the routine.
    pub fn run<C, S, T>(
        &self,
        drivetrain: &FourWheel,
        drive: &mut EncoderDrive<C, S, T>,
    ) -> Result<Vec<MoveOutcome>>
    where
        C: SessionClock,
        S: SessionState,
        T: Telemetry,
    {
        drivetrain.configure()?;

        let (left, right) = drive.positions()?;
        let telemetry = drive.telemetry_mut();
        telemetry.report("Starting at", format_args!("{:7} :{:7}", left, right));
        telemetry.flush();

        if !drive.wait_for_start() {
            warn!("Session ended before start");
        }

        let mut outcomes = Vec::with_capacity(self.plan.legs.len());
        for leg in &self.plan.legs {
            let outcome = drive.drive(&leg.command)?;
            info!("{}: {:?}", leg.label, outcome);
            outcomes.push(outcome);
        }

        let telemetry = drive.telemetry_mut();
        telemetry.report("Path", format_args!("Complete"));
        telemetry.flush();

        if drive.is_active() {
            drive.pause(self.plan.final_pause());
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        motion::encoder::{ArrivalPolicy, DriveConfig},
        peripherals::make_shared,
        sim::{ScriptedSession, SimClock, SimMotor},
        telemetry::BufferedTelemetry,
    };

    type SimDrive = EncoderDrive<SimClock, ScriptedSession, BufferedTelemetry>;

    fn rig(session: ScriptedSession) -> (FourWheel, SimDrive, [Rc<RefCell<SimMotor>>; 4]) {
        let motors = [(); 4].map(|()| make_shared(SimMotor::new(400).with_position(777)));
        let drivetrain = FourWheel::new(
            motors[0].clone(),
            motors[1].clone(),
            motors[2].clone(),
            motors[3].clone(),
        );
        let drive = EncoderDrive::new(
            DriveConfig::from_counts_per_inch(100.0).unwrap(),
            drivetrain.left_reference(),
            drivetrain.right_reference(),
            SimClock::with_tick(Duration::from_millis(100)),
            session,
            BufferedTelemetry::new(),
        )
        .with_policy(ArrivalPolicy::BothArrive);
        (drivetrain, drive, motors)
    }

    #[test]
    fn default_plan_is_the_reference_path() {
        let plan = AutonPlan::default();
        let distances: Vec<_> = plan
            .legs
            .iter()
            .map(|leg| (leg.command.left_inches(), leg.command.right_inches()))
            .collect();
        assert_eq!(distances, [(48.0, 48.0), (12.0, -12.0), (-24.0, -24.0)]);
        assert_eq!(plan.final_pause(), Duration::from_secs(1));
    }

    #[test]
    fn reference_path_runs_from_zeroed_encoders() {
        let (drivetrain, mut drive, motors) = rig(ScriptedSession::always());
        let outcomes = Autonomous::default().run(&drivetrain, &mut drive).unwrap();

        assert_eq!(outcomes, [MoveOutcome::Reached; 3]);
        assert_eq!(motors[0].borrow().position(), 4800 + 1200 - 2400);
        assert_eq!(motors[1].borrow().position(), 4800 - 1200 - 2400);
        assert!(motors.iter().all(|m| m.borrow().power() == 0.0));

        let telemetry = drive.telemetry();
        let first = telemetry.frames().next().unwrap();
        assert_eq!(first[0].0, "Starting at");
        assert_eq!(first[0].1, "      0 :      0");
        assert_eq!(telemetry.last("Path"), Some("Complete"));
        assert_eq!(
            drive.clock().slept(),
            Duration::from_millis(3 * 250) + Duration::from_secs(1)
        );
    }

    /// Start signal that checks nothing has moved while the robot is held.
    struct HeldStart {
        motor:  Rc<RefCell<SimMotor>>,
        checks: std::cell::Cell<u32>,
    }

    impl SessionState for HeldStart {
        fn is_active(&self) -> bool { true }

        fn is_started(&self) -> bool {
            assert!(self.motor.borrow().powers().is_empty());
            assert_eq!(self.motor.borrow().resets(), 1);
            self.checks.set(self.checks.get() + 1);
            self.checks.get() > 3
        }
    }

    #[test]
    fn legs_wait_for_the_start_signal() {
        let motors = [(); 4].map(|()| make_shared(SimMotor::new(400)));
        let drivetrain = FourWheel::new(
            motors[0].clone(),
            motors[1].clone(),
            motors[2].clone(),
            motors[3].clone(),
        );
        let session = HeldStart {
            motor:  motors[0].clone(),
            checks: Default::default(),
        };
        let mut drive = EncoderDrive::new(
            DriveConfig::from_counts_per_inch(100.0).unwrap(),
            drivetrain.left_reference(),
            drivetrain.right_reference(),
            SimClock::new(),
            session,
            BufferedTelemetry::new(),
        )
        .with_policy(ArrivalPolicy::BothArrive);

        let outcomes = Autonomous::default().run(&drivetrain, &mut drive).unwrap();
        assert_eq!(outcomes, [MoveOutcome::Reached; 3]);
        assert_eq!(drive.session().checks.get(), 4);
        assert!(!motors[0].borrow().powers().is_empty());
    }

    #[test]
    fn stopped_session_skips_every_leg() {
        let (drivetrain, mut drive, motors) = rig(ScriptedSession::inactive());
        let outcomes = Autonomous::default().run(&drivetrain, &mut drive).unwrap();

        assert_eq!(outcomes, [MoveOutcome::Skipped; 3]);
        assert!(motors[0].borrow().powers().is_empty());
        assert_eq!(motors[0].borrow().resets(), 1);
        assert_eq!(drive.telemetry().last("Path"), Some("Complete"));
        assert_eq!(drive.clock().slept(), Duration::ZERO);
    }

    #[test]
    fn plans_deserialize_from_json() {
        let plan: AutonPlan = serde_json::from_str(
            r#"{
                "legs": [
                    {"label": "Out", "move": {"speed": 0.6, "left_inches": 47.0, "right_inches": 47.0, "timeout_secs": 5.0}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(plan.legs.len(), 1);
        assert_eq!(plan.legs[0].command.left_inches(), 47.0);
        assert_eq!(plan.final_pause_ms, 1000);

        let negative = r#"{"legs": [{"label": "Bad", "move": {"speed": 0.6, "left_inches": 1.0, "right_inches": 1.0, "timeout_secs": -1.0}}]}"#;
        assert!(serde_json::from_str::<AutonPlan>(negative).is_err());
    }
}
