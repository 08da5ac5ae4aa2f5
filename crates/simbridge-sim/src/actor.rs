//! The [`VehicleActor`] trait – one simulated vehicle.
//!
//! Handles are shared (`Arc<dyn VehicleActor>`) between the control and
//! planning adapters, so every method takes `&self` and implementations use
//! interior mutability.  Calls must be bounded: implementations never wait
//! on the network inside these methods.

use simbridge_types::{ActorId, ActuationState, BridgeError, Transform};

/// A vehicle actor living in the simulator.
pub trait VehicleActor: Send + Sync {
    /// Simulator-assigned identifier.
    fn id(&self) -> ActorId;

    /// Blueprint type, e.g. `"vehicle.lincoln.mkz_2020"`.
    fn type_id(&self) -> &str;

    /// Free-form role name, e.g. `"hero"`.  Empty when unset.
    fn role_name(&self) -> &str;

    /// Current simulator-frame pose.
    ///
    /// # Errors
    ///
    /// [`BridgeError::ActorGone`] once the actor has been destroyed.
    fn transform(&self) -> Result<Transform, BridgeError>;

    /// Teleport the actor to `transform` in one call.
    fn set_transform(&self, transform: Transform) -> Result<(), BridgeError>;

    /// Most recently applied control vector.
    fn control(&self) -> Result<ActuationState, BridgeError>;

    /// Apply `control` in one call.
    fn apply_control(&self, control: ActuationState) -> Result<(), BridgeError>;

    /// Enable or disable the physics engine for this actor.
    fn set_simulate_physics(&self, enabled: bool) -> Result<(), BridgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Minimal in-process actor used only for tests.
    struct MockVehicle {
        transform: Mutex<Transform>,
        control: Mutex<ActuationState>,
        physics: Mutex<bool>,
    }

    impl MockVehicle {
        fn new() -> Self {
            Self {
                transform: Mutex::new(Transform::default()),
                control: Mutex::new(ActuationState::default()),
                physics: Mutex::new(true),
            }
        }
    }

    impl VehicleActor for MockVehicle {
        fn id(&self) -> ActorId {
            7
        }
        fn type_id(&self) -> &str {
            "vehicle.test"
        }
        fn role_name(&self) -> &str {
            ""
        }
        fn transform(&self) -> Result<Transform, BridgeError> {
            Ok(*self.transform.lock().unwrap())
        }
        fn set_transform(&self, transform: Transform) -> Result<(), BridgeError> {
            *self.transform.lock().unwrap() = transform;
            Ok(())
        }
        fn control(&self) -> Result<ActuationState, BridgeError> {
            Ok(*self.control.lock().unwrap())
        }
        fn apply_control(&self, control: ActuationState) -> Result<(), BridgeError> {
            *self.control.lock().unwrap() = control;
            Ok(())
        }
        fn set_simulate_physics(&self, enabled: bool) -> Result<(), BridgeError> {
            *self.physics.lock().unwrap() = enabled;
            Ok(())
        }
    }

    #[test]
    fn actor_is_usable_as_shared_trait_object() {
        let actor: std::sync::Arc<dyn VehicleActor> = std::sync::Arc::new(MockVehicle::new());
        let other = std::sync::Arc::clone(&actor);

        let control = ActuationState {
            throttle: 0.4,
            ..ActuationState::default()
        };
        actor.apply_control(control).unwrap();
        assert_eq!(other.control().unwrap(), control);

        other.set_simulate_physics(false).unwrap();
        assert_eq!(actor.id(), 7);
    }
}
