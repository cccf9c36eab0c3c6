//! Point-and-shoot route planning.
//!
//! The planner rotates the robot in place to face the target, then drives
//! straight to it. Each step becomes one relative [`MoveCommand`], so a plan
//! runs through the ordinary encoder move controller.

use log::debug;
use serde::Deserialize;
use snafu::ensure;

use super::{pose::heading_error, FieldPoint, FieldPose};
use crate::{
    error::{DriveError, InvalidCommandSnafu, InvalidConfigSnafu, OutOfFieldSnafu, Result},
    motion::encoder::{positive, MoveCommand},
};

/// Legs shorter than this (in inches of wheel travel) are left out.
const MIN_LEG_INCHES: f64 = 0.01;

/// The most legs a single plan holds: turn, drive, final turn.
pub const MAX_LEGS: usize = 3;

/// A planned route.
pub type Plan = heapless::Vec<MoveCommand, MAX_LEGS>;

/// Field geometry and the speeds and timeouts used for planned legs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawRouterConfig")]
pub struct RouterConfig {
    track_width_inches: f64,
    field_size_inches:  f64,
    drive_speed:        f64,
    turn_speed:         f64,
    drive_timeout_secs: f64,
    turn_timeout_secs:  f64,
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawRouterConfig {
    track_width_inches: f64,
    field_size_inches:  f64,
    drive_speed:        f64,
    turn_speed:         f64,
    drive_timeout_secs: f64,
    turn_timeout_secs:  f64,
}

impl Default for RawRouterConfig {
    fn default() -> Self {
        Self {
            track_width_inches: RouterConfig::DEFAULT_TRACK_WIDTH_INCHES,
            field_size_inches:  RouterConfig::DEFAULT_FIELD_SIZE_INCHES,
            drive_speed:        0.8,
            turn_speed:         0.5,
            drive_timeout_secs: 5.0,
            turn_timeout_secs:  4.0,
        }
    }
}

impl TryFrom<RawRouterConfig> for RouterConfig {
    type Error = DriveError;

    fn try_from(raw: RawRouterConfig) -> Result<Self> {
        positive("track_width_inches", raw.track_width_inches)?;
        positive("field_size_inches", raw.field_size_inches)?;
        positive("drive_speed", raw.drive_speed)?;
        positive("turn_speed", raw.turn_speed)?;
        positive("drive_timeout_secs", raw.drive_timeout_secs)?;
        positive("turn_timeout_secs", raw.turn_timeout_secs)?;
        representable("drive_timeout_secs", raw.drive_timeout_secs)?;
        representable("turn_timeout_secs", raw.turn_timeout_secs)?;
        Ok(Self {
            track_width_inches: raw.track_width_inches,
            field_size_inches:  raw.field_size_inches,
            drive_speed:        raw.drive_speed,
            turn_speed:         raw.turn_speed,
            drive_timeout_secs: raw.drive_timeout_secs,
            turn_timeout_secs:  raw.turn_timeout_secs,
        })
    }
}

impl RouterConfig {
    /// Track width at which a 12 inch per side spin is a quarter turn.
    pub const DEFAULT_TRACK_WIDTH_INCHES: f64 = 15.28;
    /// Side length of the square competition field.
    pub const DEFAULT_FIELD_SIZE_INCHES: f64 = 144.0;

    /// Validated router settings with the default speeds and timeouts.
    ///
    /// # Errors
    ///
    /// [`DriveError::InvalidConfig`] when either dimension is not positive.
    pub fn new(track_width_inches: f64, field_size_inches: f64) -> Result<Self> {
        Self::try_from(RawRouterConfig {
            track_width_inches,
            field_size_inches,
            ..RawRouterConfig::default()
        })
    }

    /// Distance between the left and right wheel contact lines.
    pub fn track_width_inches(&self) -> f64 { self.track_width_inches }

    /// Side length of the square field.
    pub fn field_size_inches(&self) -> f64 { self.field_size_inches }

    /// Power for straight legs.
    pub fn drive_speed(&self) -> f64 { self.drive_speed }

    /// Power for turn legs.
    pub fn turn_speed(&self) -> f64 { self.turn_speed }

    /// Timeout for straight legs, in seconds.
    pub fn drive_timeout_secs(&self) -> f64 { self.drive_timeout_secs }

    /// Timeout for turn legs, in seconds.
    pub fn turn_timeout_secs(&self) -> f64 { self.turn_timeout_secs }
}

impl Default for RouterConfig {
    fn default() -> Self {
        let raw = RawRouterConfig::default();
        Self {
            track_width_inches: raw.track_width_inches,
            field_size_inches:  raw.field_size_inches,
            drive_speed:        raw.drive_speed,
            turn_speed:         raw.turn_speed,
            drive_timeout_secs: raw.drive_timeout_secs,
            turn_timeout_secs:  raw.turn_timeout_secs,
        }
    }
}

/// Point-and-shoot planner.
///
/// # Example
///
/// ```ignore
/// use autodrive::motion::route::{planner::Router, FieldPoint, FieldPose};
///
/// let router = Router::new(RouterConfig::default());
/// for command in router.plan(FieldPose::new(12.0, 12.0, 0.0), FieldPoint::new(60.0, 12.0))? {
///     drive.drive(&command)?;
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Router {
    config: RouterConfig,
}

impl Router {
    /// Creates a planner.
    pub fn new(config: RouterConfig) -> Self { Self { config } }

    /// The planner settings.
    pub fn config(&self) -> &RouterConfig { &self.config }

    /// Plans a turn to face `to` followed by a straight drive to it.
    ///
    /// Zero-length legs are left out, so planning to the current location
    /// gives an empty plan.
    ///
    /// # Errors
    ///
    /// [`DriveError::OutOfField`] when `to` lies outside the field.
    pub fn plan(&self, from: FieldPose, to: FieldPoint) -> Result<Plan> {
        self.check_in_field(to)?;
        let mut plan = Plan::new();

        let distance = from.point().distance_to(to);
        if distance >= MIN_LEG_INCHES {
            let bearing = (to.y - from.y).atan2(to.x - from.x);
            if let Some(turn) = self.turn(heading_error(from.heading, bearing))? {
                push(&mut plan, turn)?;
            }
            let straight = MoveCommand::straight(
                self.config.drive_speed,
                distance,
                self.config.drive_timeout_secs,
            )?;
            push(&mut plan, straight)?;
        }
        debug!("Planned {} legs from {:?} to {:?}", plan.len(), from, to);
        Ok(plan)
    }

    /// Like [`Router::plan`], then turns to `heading` at the target.
    ///
    /// # Errors
    ///
    /// [`DriveError::OutOfField`] when the target lies outside the field.
    pub fn plan_pose(&self, from: FieldPose, to: FieldPose) -> Result<Plan> {
        let mut plan = self.plan(from, to.point())?;
        let arrival_heading = if plan.is_empty() {
            from.heading
        } else {
            (to.y - from.y).atan2(to.x - from.x)
        };
        if let Some(turn) = self.turn(heading_error(arrival_heading, to.heading))? {
            push(&mut plan, turn)?;
        }
        Ok(plan)
    }

    /// Turn-in-place leg for a counter-clockwise heading change in radians.
    fn turn(&self, delta: f64) -> Result<Option<MoveCommand>> {
        let arc = delta * self.config.track_width_inches / 2.0;
        if arc.abs() < MIN_LEG_INCHES {
            return Ok(None);
        }
        let command = MoveCommand::new(self.config.turn_speed, -arc, arc, self.config.turn_timeout_secs)?;
        Ok(Some(command))
    }

    fn check_in_field(&self, to: FieldPoint) -> Result<()> {
        let size = self.config.field_size_inches;
        let inside = |v: f64| v.is_finite() && (0.0..=size).contains(&v);
        ensure!(
            inside(to.x) && inside(to.y),
            OutOfFieldSnafu {
                x: to.x,
                y: to.y,
                size,
            }
        );
        Ok(())
    }
}

/// Timeouts must fit in a [`Duration`](std::time::Duration).
fn representable(field: &'static str, secs: f64) -> Result<()> {
    ensure!(
        std::time::Duration::try_from_secs_f64(secs).is_ok(),
        InvalidConfigSnafu { field, value: secs }
    );
    Ok(())
}

fn push(plan: &mut Plan, command: MoveCommand) -> Result<()> {
    plan.push(command)
        .map_err(|_| InvalidCommandSnafu { reason: "route has too many legs" }.build())
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn router() -> Router { Router::new(RouterConfig::new(16.0, 144.0).unwrap()) }

    #[test]
    fn aligned_target_is_one_straight_leg() {
        let plan = router()
            .plan(FieldPose::new(12.0, 12.0, 0.0), FieldPoint::new(60.0, 12.0))
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].left_inches(), 48.0);
        assert_eq!(plan[0].right_inches(), 48.0);
        assert_eq!(plan[0].speed(), 0.8);
    }

    #[test]
    fn left_target_turns_counter_clockwise_first() {
        let plan = router()
            .plan(FieldPose::new(12.0, 12.0, 0.0), FieldPoint::new(12.0, 36.0))
            .unwrap();
        assert_eq!(plan.len(), 2);
        let arc = FRAC_PI_2 * 16.0 / 2.0;
        assert!((plan[0].left_inches() + arc).abs() < TOLERANCE);
        assert!((plan[0].right_inches() - arc).abs() < TOLERANCE);
        assert_eq!(plan[0].speed(), 0.5);
        assert!((plan[1].left_inches() - 24.0).abs() < TOLERANCE);
    }

    #[test]
    fn turns_take_the_short_way() {
        // Facing +y, target behind and to the right: turn clockwise
        let plan = router()
            .plan(FieldPose::new(72.0, 72.0, FRAC_PI_2), FieldPoint::new(96.0, 72.0))
            .unwrap();
        assert!(plan[0].left_inches() > 0.0);
        assert!(plan[0].right_inches() < 0.0);
    }

    #[test]
    fn planning_to_the_current_spot_is_empty() {
        let here = FieldPose::new(30.0, 30.0, 1.0);
        assert!(router().plan(here, here.point()).unwrap().is_empty());
    }

    #[test]
    fn pose_plans_end_with_the_final_turn() {
        let plan = router()
            .plan_pose(FieldPose::new(12.0, 12.0, 0.0), FieldPose::new(60.0, 12.0, FRAC_PI_2))
            .unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan[1].left_inches() < 0.0);
        assert!((plan[1].right_inches() - FRAC_PI_2 * 8.0).abs() < TOLERANCE);
    }

    #[test]
    fn targets_off_the_field_are_rejected() {
        let err = router()
            .plan(FieldPose::origin(), FieldPoint::new(150.0, 10.0))
            .unwrap_err();
        assert!(matches!(err, DriveError::OutOfField { .. }));
        assert!(router().plan(FieldPose::origin(), FieldPoint::new(-1.0, 0.0)).is_err());
        assert!(router().plan(FieldPose::origin(), FieldPoint::new(144.0, 144.0)).is_ok());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: RouterConfig = serde_json::from_str(r#"{"track_width_inches": 14.0}"#).unwrap();
        assert_eq!(config.track_width_inches(), 14.0);
        assert_eq!(config.field_size_inches(), 144.0);
        assert!(serde_json::from_str::<RouterConfig>(r#"{"drive_speed": 0.0}"#).is_err());
        assert!(serde_json::from_str::<RouterConfig>(r#"{"colour": "red"}"#).is_err());
    }

    #[test]
    fn oversized_timeouts_fail_validation() {
        let err = serde_json::from_str::<RouterConfig>(r#"{"drive_timeout_secs": 1e300}"#).unwrap_err();
        assert!(err.to_string().contains("drive_timeout_secs"));
        assert!(serde_json::from_str::<RouterConfig>(r#"{"turn_timeout_secs": 1e300}"#).is_err());
    }
}
