//! Field-relative routing.
//!
//! The move controller only knows relative encoder travel. This module adds
//! the field frame on top of it:
//!
//! - **[`pose`]**: where the robot is, fed by odometry or by measured
//!   encoder travel.
//! - **[`planner`]**: point-and-shoot planning that turns a field target
//!   into relative [`MoveCommand`](crate::motion::encoder::MoveCommand)s.
//! - **[`follower`]**: executes plans and keeps the pose up to date.
//!
//! # Frame
//!
//! The field is a square with its origin in one corner. `x` and `y` are in
//! inches, heading is in radians, counter-clockwise positive, with zero
//! pointing along `+x`.
//!
//! # Example
//!
//! ```ignore
//! use autodrive::motion::route::{follower::RouteFollower, FieldPoint, FieldPose};
//!
//! let mut follower = RouteFollower::new(FieldPose::new(12.0, 12.0, 0.0), field_config);
//! follower.goto(&mut drive, FieldPoint::new(72.0, 36.0))?;
//! ```

/// Point-and-shoot execution with pose feedback.
pub mod follower;

/// Point-and-shoot planning.
pub mod planner;

/// Pose tracking.
pub mod pose;

use std::f64::consts::{PI, TAU};

/// A location on the field in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldPoint {
    /// The x-coordinate in inches.
    pub x: f64,
    /// The y-coordinate in inches.
    pub y: f64,
}

impl FieldPoint {
    /// Create a new point using `x` and `y` coordinates
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }

    /// Straight-line distance to `other`.
    pub fn distance_to(&self, other: FieldPoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// A field location with heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldPose {
    /// The x-coordinate in inches.
    pub x:       f64,
    /// The y-coordinate in inches.
    pub y:       f64,
    /// Heading in radians, counter-clockwise from `+x`.
    pub heading: f64,
}

impl FieldPose {
    /// Creates a pose. The heading is wrapped into `(-π, π]`.
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: wrap_angle(heading),
        }
    }

    /// The field corner, facing `+x`.
    pub fn origin() -> Self { Self::new(0.0, 0.0, 0.0) }

    /// The location part of the pose.
    pub fn point(&self) -> FieldPoint { FieldPoint::new(self.x, self.y) }
}

/// Wraps an angle in radians into `(-π, π]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI { PI } else { wrapped }
}
