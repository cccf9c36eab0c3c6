//! Point-and-shoot execution.

use log::{info, warn};

use super::{
    planner::{Plan, Router, RouterConfig},
    pose::PoseTracker,
    FieldPoint, FieldPose,
};
use crate::{
    error::Result,
    motion::encoder::{EncoderDrive, MoveOutcome},
    peripherals::{SessionClock, SessionState},
    telemetry::Telemetry,
};

/// Drives to field targets and keeps the pose estimate current.
///
/// After every leg the measured encoder travel, not the commanded travel, is
/// fed into the tracker, so legs cut short by a timeout still leave an
/// honest estimate behind.
///
/// # Example
///
/// ```ignore
/// let mut follower = RouteFollower::new(FieldPose::new(12.0, 12.0, 0.0), RouterConfig::default());
/// if follower.goto(&mut drive, FieldPoint::new(60.0, 36.0))?.is_reached() {
///     println!("at {:?}", follower.pose());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RouteFollower {
    tracker: PoseTracker,
    router:  Router,
}

impl RouteFollower {
    /// Creates a follower starting at `start`.
    pub fn new(start: FieldPose, config: RouterConfig) -> Self {
        Self {
            tracker: PoseTracker::new(start, config.track_width_inches()),
            router:  Router::new(config),
        }
    }

    /// The current pose estimate.
    pub fn pose(&self) -> FieldPose { self.tracker.pose() }

    /// The pose tracker, e.g. to feed it odometry.
    pub fn tracker_mut(&mut self) -> &mut PoseTracker { &mut self.tracker }

    /// The planner.
    pub fn router(&self) -> &Router { &self.router }

    /// Turns to face `to`, then drives to it.
    ///
    /// Returns the outcome of the first leg that did not reach its target,
    /// or [`MoveOutcome::Reached`] when every leg did.
    ///
    /// # Errors
    ///
    /// [`DriveError::OutOfField`](crate::error::DriveError::OutOfField) for
    /// targets off the field, and any error from the move controller.
    pub fn goto<C, S, T>(
        &mut self,
        drive: &mut EncoderDrive<C, S, T>,
        to: FieldPoint,
    ) -> Result<MoveOutcome>
    where
        C: SessionClock,
        S: SessionState,
        T: Telemetry,
    {
        let plan = self.router.plan(self.tracker.pose(), to)?;
        self.follow(drive, &plan)
    }

    /// Drives to `to` and finishes facing its heading.
    ///
    /// # Errors
    ///
    /// As for [`RouteFollower::goto`].
    pub fn goto_pose<C, S, T>(
        &mut self,
        drive: &mut EncoderDrive<C, S, T>,
        to: FieldPose,
    ) -> Result<MoveOutcome>
    where
        C: SessionClock,
        S: SessionState,
        T: Telemetry,
    {
        let plan = self.router.plan_pose(self.tracker.pose(), to)?;
        self.follow(drive, &plan)
    }

    fn follow<C, S, T>(&mut self, drive: &mut EncoderDrive<C, S, T>, plan: &Plan) -> Result<MoveOutcome>
    where
        C: SessionClock,
        S: SessionState,
        T: Telemetry,
    {
        for (leg, command) in plan.iter().enumerate() {
            let before = drive.positions()?;
            let outcome = drive.drive(command)?;
            let after = drive.positions()?;

            let config = drive.config();
            self.tracker.apply_travel(
                config.inches_for(after.0.saturating_sub(before.0)),
                config.inches_for(after.1.saturating_sub(before.1)),
            );

            if !outcome.is_reached() {
                warn!("Route stopped on leg {}: {:?}", leg + 1, outcome);
                return Ok(outcome);
            }
        }
        info!("Route complete at {:?}", self.tracker.pose());
        Ok(MoveOutcome::Reached)
    }
}
