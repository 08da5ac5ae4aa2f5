//! Planning adapter: trajectories → teleported vehicle pose.
//!
//! Each [`TrajectoryMessage`] supersedes the previous one.  The adapter
//! matches the trajectory against the vehicle's current location, then
//! acquires pose-injection mode (physics off) and assigns the look-ahead pose
//! in one `set_transform` call.  A trajectory that yields no target leaves
//! the vehicle and its physics flag alone.  Elevation, pitch and roll are kept from the
//! vehicle's current transform.

use simbridge_frames::{LookAhead, TrackingTarget, TrajectoryMatcher};
use simbridge_kernel::{ActuationGate, BridgeMessage};
use simbridge_types::{ActuationMode, BridgeError, EventPayload, Transform, TrajectoryMessage};
use tracing::{debug, instrument};

use crate::adapter::{MessageHandler, unexpected_payload};

/// Outcome of one successful pose injection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseUpdate {
    pub target: TrackingTarget,
    pub transform: Transform,
}

/// Drives the gated vehicle along incoming trajectories.
pub struct PlanningAdapter {
    gate: ActuationGate,
    matcher: TrajectoryMatcher,
    last_trajectory: Option<TrajectoryMessage>,
}

impl PlanningAdapter {
    pub const HOLDER: &'static str = "planning";

    pub fn new(gate: ActuationGate, look_ahead: LookAhead) -> Self {
        Self {
            gate,
            matcher: TrajectoryMatcher::new(look_ahead),
            last_trajectory: None,
        }
    }

    /// Most recent trajectory received, whether or not it was applied.
    pub fn last_trajectory(&self) -> Option<&TrajectoryMessage> {
        self.last_trajectory.as_ref()
    }

    /// Verify, match and inject one trajectory.
    #[instrument(name = "planning", skip_all, fields(points = trajectory.points().len()))]
    pub fn on_trajectory(
        &mut self,
        trajectory: &TrajectoryMessage,
    ) -> Result<PoseUpdate, BridgeError> {
        self.last_trajectory = Some(trajectory.clone());

        let actor = self.gate.inspect(BridgeMessage::Trajectory(trajectory))?;
        let current = actor.transform()?;
        let target = self.matcher.track(trajectory.points(), &current.location)?;
        let transform = target
            .pose
            .to_transform(current.location.z, current.rotation);

        // Physics goes off only once there is a pose to assign.
        let actor = self.gate.acquire(Self::HOLDER, ActuationMode::PoseInjection)?;
        actor.set_transform(transform)?;

        debug!(
            actor_id = actor.id(),
            nearest_index = target.nearest_index,
            target_index = target.target_index,
            relative_time = target.relative_time,
            x = transform.location.x,
            y = transform.location.y,
            yaw = transform.rotation.yaw,
            clamped = target.clamped,
            "pose injected"
        );
        Ok(PoseUpdate { target, transform })
    }
}

impl MessageHandler for PlanningAdapter {
    fn name(&self) -> &str {
        Self::HOLDER
    }

    fn handle(&mut self, payload: &EventPayload) -> Result<(), BridgeError> {
        match payload {
            EventPayload::Trajectory(trajectory) => self.on_trajectory(trajectory).map(|_| ()),
            other => Err(unexpected_payload(Self::HOLDER, other)),
        }
    }
}

/// Hands the actor back when the reader owning this adapter goes away.
impl Drop for PlanningAdapter {
    fn drop(&mut self) {
        self.gate.release(Self::HOLDER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbridge_kernel::{MessageVerifier, ModeArbiter};
    use simbridge_sim::sim::{SimCall, SimVehicle};
    use simbridge_types::{Location, Rotation, TrajectoryPoint};
    use std::sync::Arc;
    use std::time::Duration;

    fn adapter(start: Transform, look_ahead: LookAhead) -> (Arc<SimVehicle>, PlanningAdapter) {
        let vehicle = Arc::new(SimVehicle::new(2, "vehicle.lincoln.mkz_2020").with_transform(start));
        let arbiter = Arc::new(ModeArbiter::new(vehicle.clone(), Duration::from_millis(500)));
        let gate = ActuationGate::new(MessageVerifier::with_default_rules(), arbiter);
        (vehicle, PlanningAdapter::new(gate, look_ahead))
    }

    fn straight_line() -> TrajectoryMessage {
        TrajectoryMessage::new(vec![
            TrajectoryPoint::new(0.0, 0.0, 0.0, 0.0),
            TrajectoryPoint::new(5.0, 0.0, 0.0, 0.5),
            TrajectoryPoint::new(10.0, 0.0, 0.0, 1.0),
        ])
    }

    #[test]
    fn pose_keeps_elevation_pitch_and_roll() {
        let start = Transform::new(
            Location::new(0.2, 0.0, 1.5),
            Rotation {
                pitch: 2.0,
                yaw: 45.0,
                roll: -1.0,
            },
        );
        let (vehicle, mut adapter) = adapter(start, LookAhead::Clamp);
        let update = adapter.on_trajectory(&straight_line()).unwrap();

        assert_eq!(update.target.nearest_index, 0);
        assert_eq!(update.target.target_index, 1);
        assert_eq!(update.transform.location, Location::new(5.0, -0.0, 1.5));
        assert_eq!(update.transform.rotation.pitch, 2.0);
        assert_eq!(update.transform.rotation.roll, -1.0);
        assert_eq!(update.transform.rotation.yaw, -0.0);
        assert_eq!(
            vehicle.calls(),
            vec![
                SimCall::SetSimulatePhysics(false),
                SimCall::SetTransform(update.transform)
            ]
        );
    }

    #[test]
    fn physics_is_disabled_only_once() {
        let (vehicle, mut adapter) = adapter(Transform::default(), LookAhead::Clamp);
        for _ in 0..3 {
            adapter.on_trajectory(&straight_line()).unwrap();
        }
        let toggles = vehicle
            .calls()
            .into_iter()
            .filter(|c| matches!(c, SimCall::SetSimulatePhysics(_)))
            .count();
        assert_eq!(toggles, 1);
    }

    #[test]
    fn skip_policy_rejects_overrun_without_moving() {
        let start = Transform::new(Location::new(20.0, 0.0, 0.0), Rotation::default());
        let (vehicle, mut adapter) = adapter(start, LookAhead::Skip);
        let result = adapter.on_trajectory(&straight_line());
        assert_eq!(result, Err(BridgeError::LookAheadOverrun { nearest_index: 2 }));
        assert!(vehicle.calls().is_empty());
        assert!(vehicle.physics_enabled());
    }

    #[test]
    fn overrun_does_not_take_the_actor_from_control() {
        let start = Transform::new(Location::new(20.0, 0.0, 0.0), Rotation::default());
        let vehicle = Arc::new(SimVehicle::new(2, "vehicle.lincoln.mkz_2020").with_transform(start));
        let arbiter = Arc::new(ModeArbiter::new(vehicle.clone(), Duration::ZERO));
        arbiter
            .acquire("control", ActuationMode::ControlInjection)
            .unwrap();
        let gate = ActuationGate::new(MessageVerifier::with_default_rules(), Arc::clone(&arbiter));
        let mut adapter = PlanningAdapter::new(gate, LookAhead::Skip);

        assert!(adapter.on_trajectory(&straight_line()).is_err());
        assert_eq!(
            arbiter.current(),
            Some(("control".to_string(), ActuationMode::ControlInjection))
        );
        assert_eq!(vehicle.calls(), vec![SimCall::SetSimulatePhysics(true)]);
    }

    #[test]
    fn rejected_trajectory_is_still_retained() {
        let (vehicle, mut adapter) = adapter(Transform::default(), LookAhead::Clamp);
        let short = TrajectoryMessage::new(vec![TrajectoryPoint::new(1.0, 1.0, 0.0, 0.0)]);
        let result = adapter.on_trajectory(&short);
        assert_eq!(result, Err(BridgeError::TrajectoryTooShort { points: 1 }));
        assert_eq!(adapter.last_trajectory(), Some(&short));
        assert!(vehicle.calls().is_empty());
    }

    #[test]
    fn control_payload_is_rejected() {
        let (_vehicle, mut adapter) = adapter(Transform::default(), LookAhead::Clamp);
        let result = adapter.handle(&EventPayload::Control(Default::default()));
        assert!(matches!(result, Err(BridgeError::MalformedMessage(_))));
    }
}
