//! Field pose tracking.
//!
//! [`PoseTracker`] holds the robot's best estimate of where it is. It can be
//! fed two ways: a full pose from an external odometry source with
//! [`PoseTracker::update`], or measured wheel travel with
//! [`PoseTracker::apply_travel`], which integrates a differential-drive arc.

use log::trace;

use super::{wrap_angle, FieldPose};

/// Turns smaller than this are integrated as straight lines.
const STRAIGHT_EPSILON: f64 = 1e-9;

/// Field pose tracker.
///
/// # Example
///
/// ```ignore
/// use autodrive::motion::route::{pose::PoseTracker, FieldPose};
///
/// let mut tracker = PoseTracker::new(FieldPose::new(12.0, 12.0, 0.0), 15.28);
/// tracker.apply_travel(24.0, 24.0);
/// assert_eq!(tracker.pose().x, 36.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseTracker {
    pose:        FieldPose,
    track_width: f64,
}

impl PoseTracker {
    /// Creates a tracker starting at `pose`.
    ///
    /// # Arguments
    ///
    /// * `pose` - The initial position and heading.
    /// * `track_width` - Distance between the left and right wheel contact
    ///   lines in inches.
    pub fn new(pose: FieldPose, track_width: f64) -> Self { Self { pose, track_width } }

    /// The current pose estimate.
    pub fn pose(&self) -> FieldPose { self.pose }

    /// The track width used for arc integration.
    pub fn track_width(&self) -> f64 { self.track_width }

    /// Replaces the estimate, e.g. with a reading from odometry.
    pub fn update(&mut self, pose: FieldPose) { self.pose = pose; }

    /// Resets the estimate to the field corner facing `+x`.
    pub fn reset_origin(&mut self) { self.pose = FieldPose::origin(); }

    /// Integrates one stretch of wheel travel.
    ///
    /// The robot is assumed to follow a constant-curvature arc while the
    /// left side covers `left_inches` and the right side `right_inches`.
    pub fn apply_travel(&mut self, left_inches: f64, right_inches: f64) {
        let (dx, dy, dt) = arc_delta(left_inches, right_inches, self.pose.heading, self.track_width);
        self.pose = FieldPose::new(self.pose.x + dx, self.pose.y + dy, self.pose.heading + dt);
        trace!("Pose now {:?}", self.pose);
    }
}

/// Global `(dx, dy, dθ)` for an arc starting at `heading`.
fn arc_delta(left: f64, right: f64, heading: f64, track_width: f64) -> (f64, f64, f64) {
    let distance = (left + right) / 2.0;
    let delta_t = (right - left) / track_width;

    // Chord length of the arc, or the plain distance when driving straight
    let chord = if delta_t.abs() < STRAIGHT_EPSILON {
        distance
    } else {
        2.0 * (delta_t / 2.0).sin() * (distance / delta_t)
    };
    let avg_t = heading + delta_t / 2.0;
    (chord * avg_t.cos(), chord * avg_t.sin(), delta_t)
}

/// Heading change needed to go from `from` to `to`, wrapped into `(-π, π]`.
pub fn heading_error(from: f64, to: f64) -> f64 { wrap_angle(to - from) }

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn straight_travel_follows_heading() {
        let mut tracker = PoseTracker::new(FieldPose::new(10.0, 10.0, FRAC_PI_2), 15.0);
        tracker.apply_travel(24.0, 24.0);
        let pose = tracker.pose();
        assert!((pose.x - 10.0).abs() < TOLERANCE);
        assert!((pose.y - 34.0).abs() < TOLERANCE);
        assert!((pose.heading - FRAC_PI_2).abs() < TOLERANCE);
    }

    #[test]
    fn spin_in_place_only_turns() {
        let track_width = 16.0;
        let mut tracker = PoseTracker::new(FieldPose::origin(), track_width);
        // Quarter turn counter-clockwise
        let a = FRAC_PI_2 * track_width / 2.0;
        tracker.apply_travel(-a, a);
        let pose = tracker.pose();
        assert!(pose.x.abs() < TOLERANCE);
        assert!(pose.y.abs() < TOLERANCE);
        assert!((pose.heading - FRAC_PI_2).abs() < TOLERANCE);
    }

    #[test]
    fn arc_lands_on_the_circle() {
        // Right side on a 10 inch radius, left side on 0: a pivot about the
        // left wheel through a half turn
        let track_width = 10.0;
        let mut tracker = PoseTracker::new(FieldPose::origin(), track_width);
        tracker.apply_travel(0.0, PI * track_width);
        let pose = tracker.pose();
        assert!(pose.x.abs() < 1e-6);
        assert!((pose.y - track_width).abs() < 1e-6);
        assert!((pose.heading - PI).abs() < 1e-6);
    }

    #[test]
    fn update_and_reset_replace_the_estimate() {
        let mut tracker = PoseTracker::new(FieldPose::origin(), 15.0);
        tracker.update(FieldPose::new(72.0, 72.0, 1.0));
        assert_eq!(tracker.pose().point().x, 72.0);
        tracker.reset_origin();
        assert_eq!(tracker.pose(), FieldPose::origin());
    }

    #[test]
    fn heading_error_takes_the_short_way() {
        assert!((heading_error(3.0, -3.0) - (2.0 * PI - 6.0)).abs() < TOLERANCE);
        assert!((heading_error(0.0, FRAC_PI_2) - FRAC_PI_2).abs() < TOLERANCE);
    }
}
