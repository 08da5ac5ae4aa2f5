//! Planning frame ↔ simulator frame conversion.
//!
//! The planning frame is 2-D and right-handed with headings in radians.  The
//! simulator frame is 3-D with the Y axis mirrored and yaw in degrees, so the
//! two frames have opposite chirality about the vertical axis:
//!
//! | Quantity | Planning | Simulator |
//! |---|---|---|
//! | x | `x` | `x` |
//! | y | `y` | `-y` |
//! | heading | `theta` (rad) | `-degrees(theta)` |
//!
//! Elevation is not part of a plan; callers supply `z` from the vehicle's
//! current transform.
//!
//! # Example
//!
//! ```rust
//! use simbridge_frames::frame::{planning_to_sim, sim_to_planning};
//!
//! let (x, y, yaw) = planning_to_sim(2.0, 3.0, std::f64::consts::FRAC_PI_2);
//! assert_eq!((x, y), (2.0, -3.0));
//! assert!((yaw + 90.0).abs() < 1e-9);
//!
//! let (px, py, theta) = sim_to_planning(x, y, yaw);
//! assert_eq!((px, py), (2.0, 3.0));
//! assert!((theta - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
//! ```

use simbridge_types::{Location, PathPoint, Rotation, Transform};

/// Convert a planning-frame point `(x, y, theta)` into simulator
/// `(x', y', heading_deg')`.
pub fn planning_to_sim(x: f64, y: f64, theta: f64) -> (f64, f64, f64) {
    (x, -y, -theta.to_degrees())
}

/// Inverse of [`planning_to_sim`].
pub fn sim_to_planning(x: f64, y: f64, heading_deg: f64) -> (f64, f64, f64) {
    (x, -y, (-heading_deg).to_radians())
}

/// A planar pose in the simulator frame (metres, yaw in degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarPose {
    pub x: f64,
    pub y: f64,
    pub yaw_deg: f64,
}

impl PlanarPose {
    /// Convert a planning-frame [`PathPoint`] into the simulator frame.
    pub fn from_path_point(point: &PathPoint) -> Self {
        let (x, y, yaw_deg) = planning_to_sim(point.x, point.y, point.theta);
        Self { x, y, yaw_deg }
    }

    /// Euclidean distance to a simulator-frame location, ignoring elevation.
    pub fn planar_distance(&self, location: &Location) -> f64 {
        (self.x - location.x).hypot(self.y - location.y)
    }

    /// Lift into a full simulator [`Transform`].
    ///
    /// `z` comes from the vehicle's current location; pitch and roll are kept
    /// from `base` and only yaw is replaced.
    pub fn to_transform(&self, z: f64, base: Rotation) -> Transform {
        Transform::new(
            Location::new(self.x, self.y, z),
            Rotation {
                yaw: self.yaw_deg,
                ..base
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn y_axis_is_mirrored() {
        let (x, y, _) = planning_to_sim(1.5, 4.0, 0.0);
        assert_eq!(x, 1.5);
        assert_eq!(y, -4.0);
    }

    #[test]
    fn heading_is_negated_and_converted_to_degrees() {
        let (_, _, yaw) = planning_to_sim(0.0, 0.0, FRAC_PI_2);
        assert!((yaw + 90.0).abs() < 1e-9, "yaw={yaw}");

        let (_, _, yaw) = planning_to_sim(0.0, 0.0, -FRAC_PI_4);
        assert!((yaw - 45.0).abs() < 1e-9, "yaw={yaw}");
    }

    #[test]
    fn zero_heading_maps_to_zero_yaw() {
        let (_, _, yaw) = planning_to_sim(3.0, 3.0, 0.0);
        assert_eq!(yaw, 0.0);
    }

    #[test]
    fn round_trip_restores_position_exactly() {
        for &(x, y) in &[(0.0, 0.0), (1.25, -7.5), (-1e6, 3.0e-3), (42.0, 42.0)] {
            let (sx, sy, _) = planning_to_sim(x, y, 0.3);
            let (px, py, _) = sim_to_planning(sx, sy, 0.0);
            assert_eq!((px, py), (x, y));
        }
    }

    #[test]
    fn round_trip_restores_heading() {
        for &theta in &[0.0, 0.5, -1.2, PI, -PI + 1e-3] {
            let (sx, sy, yaw) = planning_to_sim(0.0, 0.0, theta);
            let (_, _, back) = sim_to_planning(sx, sy, yaw);
            assert!((back - theta).abs() < 1e-12, "theta={theta} back={back}");
        }
    }

    #[test]
    fn planar_pose_keeps_pitch_and_roll() {
        let pose = PlanarPose::from_path_point(&PathPoint {
            x: 2.0,
            y: 2.0,
            theta: 0.0,
        });
        let base = Rotation {
            pitch: 1.5,
            yaw: 170.0,
            roll: -0.5,
        };
        let t = pose.to_transform(0.3, base);
        assert_eq!(t.location, Location::new(2.0, -2.0, 0.3));
        assert_eq!(t.rotation.pitch, 1.5);
        assert_eq!(t.rotation.roll, -0.5);
        assert_eq!(t.rotation.yaw, 0.0);
    }

    #[test]
    fn planar_distance_ignores_elevation() {
        let pose = PlanarPose {
            x: 3.0,
            y: 4.0,
            yaw_deg: 0.0,
        };
        let d = pose.planar_distance(&Location::new(0.0, 0.0, 100.0));
        assert!((d - 5.0).abs() < 1e-12);
    }
}
