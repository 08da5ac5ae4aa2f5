//! Nearest-point trajectory matching with one-step look-ahead.
//!
//! Every candidate point is converted into the simulator frame before its
//! distance to the vehicle is measured, so the comparison never mixes frames.
//!
//! The scan is seeded with the first point's distance and only replaces the
//! running minimum on a strictly smaller distance, which makes the leftmost
//! point win ties.  The target is the point *after* the nearest one so the
//! vehicle is driven toward where the plan is heading.
//!
//! # Example
//!
//! ```rust
//! use simbridge_frames::matcher::{LookAhead, TrajectoryMatcher};
//! use simbridge_types::{Location, TrajectoryPoint};
//!
//! let points = [
//!     TrajectoryPoint::new(0.0, 0.0, 0.0, 0.0),
//!     TrajectoryPoint::new(1.0, 1.0, 0.0, 0.1),
//!     TrajectoryPoint::new(2.0, 2.0, 0.0, 0.2),
//! ];
//! let matcher = TrajectoryMatcher::new(LookAhead::Clamp);
//! let target = matcher.track(&points, &Location::new(0.9, -0.9, 0.0)).unwrap();
//! assert_eq!(target.nearest_index, 1);
//! assert_eq!(target.target_index, 2);
//! assert_eq!((target.pose.x, target.pose.y), (2.0, -2.0));
//! ```

use simbridge_types::{BridgeError, Location, TrajectoryPoint};
use tracing::debug;

use crate::frame::PlanarPose;

/// What to do when the nearest point is already the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookAhead {
    /// Target the last point and flag the result as clamped.
    #[default]
    Clamp,
    /// Refuse to produce a target ([`BridgeError::LookAheadOverrun`]).
    Skip,
}

impl std::str::FromStr for LookAhead {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clamp" => Ok(LookAhead::Clamp),
            "skip" => Ok(LookAhead::Skip),
            other => Err(format!("unknown look-ahead policy '{other}'")),
        }
    }
}

/// Result of matching one trajectory against the vehicle position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingTarget {
    pub nearest_index: usize,
    pub nearest_distance: f64,
    pub target_index: usize,
    /// Target pose in the simulator frame.
    pub pose: PlanarPose,
    /// Diagnostic only.
    pub relative_time: f64,
    /// `true` when the look-ahead ran past the end and was clamped.
    pub clamped: bool,
}

/// Stateless nearest-point matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrajectoryMatcher {
    look_ahead: LookAhead,
}

impl TrajectoryMatcher {
    pub fn new(look_ahead: LookAhead) -> Self {
        Self { look_ahead }
    }

    pub fn look_ahead(&self) -> LookAhead {
        self.look_ahead
    }

    /// Index and distance of the point nearest `vehicle`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::TrajectoryTooShort`] for fewer than two points.
    pub fn nearest(
        &self,
        points: &[TrajectoryPoint],
        vehicle: &Location,
    ) -> Result<(usize, f64), BridgeError> {
        let [first, rest @ ..] = points else {
            return Err(BridgeError::TrajectoryTooShort { points: 0 });
        };
        if rest.is_empty() {
            return Err(BridgeError::TrajectoryTooShort { points: 1 });
        }

        let mut nearest_index = 0;
        let mut nearest_distance =
            PlanarPose::from_path_point(&first.path_point).planar_distance(vehicle);

        for (offset, point) in rest.iter().enumerate() {
            let distance = PlanarPose::from_path_point(&point.path_point).planar_distance(vehicle);
            if distance < nearest_distance {
                nearest_distance = distance;
                nearest_index = offset + 1;
            }
        }

        Ok((nearest_index, nearest_distance))
    }

    /// Match `points` against `vehicle` and select the look-ahead target.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::TrajectoryTooShort`] – fewer than two points.
    /// - [`BridgeError::LookAheadOverrun`] – nearest point is the last one and
    ///   the policy is [`LookAhead::Skip`].
    pub fn track(
        &self,
        points: &[TrajectoryPoint],
        vehicle: &Location,
    ) -> Result<TrackingTarget, BridgeError> {
        let (nearest_index, nearest_distance) = self.nearest(points, vehicle)?;
        let last = points.len() - 1;

        let (target_index, clamped) = if nearest_index < last {
            (nearest_index + 1, false)
        } else {
            match self.look_ahead {
                LookAhead::Clamp => {
                    debug!(nearest_index, "look-ahead clamped to last trajectory point");
                    (last, true)
                }
                LookAhead::Skip => return Err(BridgeError::LookAheadOverrun { nearest_index }),
            }
        };

        let target = &points[target_index];
        Ok(TrackingTarget {
            nearest_index,
            nearest_distance,
            target_index,
            pose: PlanarPose::from_path_point(&target.path_point),
            relative_time: target.relative_time,
            clamped,
        })
    }
}
