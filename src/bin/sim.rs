//! Runs the autonomous plan, then a short field route, against simulated
//! motors.
//!
//! ```text
//! autodrive-sim [config.json]
//! ```

use std::{env, time::Duration};

use autodrive::{
    auton::Autonomous,
    config::RobotConfig,
    fs::logger,
    motion::route::{follower::RouteFollower, FieldPoint, FieldPose},
    peripherals::{drivetrain::FourWheel, make_shared},
    sim::{SimClock, SimMotor},
    telemetry::LogTelemetry,
    DriveError,
};
use log::{info, warn, Level, LevelFilter};

/// Counts a simulated motor covers per poll at full power.
const SIM_COUNTS_PER_POLL: i32 = 120;

fn main() -> Result<(), DriveError> {
    if let Err(e) = logger::init(LevelFilter::Debug) {
        eprintln!("Logger unavailable: {e}");
    }

    let config = match env::args().nth(1) {
        Some(path) => RobotConfig::load(path)?,
        None => RobotConfig::default(),
    };

    let drivetrain = FourWheel::new(
        make_shared(SimMotor::new(SIM_COUNTS_PER_POLL)),
        make_shared(SimMotor::new(SIM_COUNTS_PER_POLL)),
        make_shared(SimMotor::new(SIM_COUNTS_PER_POLL)),
        make_shared(SimMotor::new(SIM_COUNTS_PER_POLL)),
    );
    let mut drive = config.encoder_drive(
        &drivetrain,
        SimClock::with_tick(Duration::from_millis(5)),
        || true,
        LogTelemetry::with_level(Level::Trace),
    );

    let outcomes = Autonomous::new(config.auton.clone()).run(&drivetrain, &mut drive)?;
    for (leg, outcome) in config.auton.legs.iter().zip(&outcomes) {
        info!("{:<16} {:?}", leg.label, outcome);
    }

    let mut follower = RouteFollower::new(FieldPose::new(12.0, 12.0, 0.0), config.field);
    let outcome = follower.goto(&mut drive, FieldPoint::new(60.0, 36.0))?;
    if !outcome.is_reached() {
        warn!("Route ended early: {:?}", outcome);
    }
    info!(
        "Finished at {:?} after {:?} of simulated time",
        follower.pose(),
        drive.clock().now()
    );

    log::logger().flush();
    Ok(())
}
