//! `simbridge-frames` – planning-frame ↔ simulator-frame geometry.
//!
//! Pure functions only; nothing in this crate touches the simulator or the
//! message bus.
//!
//! # Modules
//!
//! - [`frame`] – conversion between the autonomy stack's right-handed planning
//!   frame and the simulator's left-handed frame ([`planning_to_sim`],
//!   [`sim_to_planning`], [`PlanarPose`][frame::PlanarPose]).
//! - [`matcher`] – [`TrajectoryMatcher`][matcher::TrajectoryMatcher]: locates
//!   the trajectory point nearest the vehicle and selects the look-ahead
//!   target one index beyond it.

pub mod frame;
pub mod matcher;

pub use frame::{PlanarPose, planning_to_sim, sim_to_planning};
pub use matcher::{LookAhead, TrackingTarget, TrajectoryMatcher};
