//! In-process simulator for CI/CD testing without a running simulator.
//!
//! [`SimWorld`] holds stub [`SimVehicle`]s that record every command they
//! receive and echo back the last pose and control they were given.  No
//! dynamics are modelled: applying a control does not move the vehicle.
//!
//! # Example
//!
//! ```rust
//! use simbridge_sim::sim::{SimVehicle, SimWorld};
//! use simbridge_sim::resolve_vehicle;
//! use simbridge_types::ActuationState;
//!
//! let world = SimWorld::new()
//!     .with_vehicle(SimVehicle::new(1, "vehicle.lincoln.mkz_2020"));
//!
//! let actor = resolve_vehicle(&world, "vehicle.lincoln.mkz*").expect("actor must resolve");
//! actor
//!     .apply_control(ActuationState { throttle: 0.5, ..ActuationState::default() })
//!     .expect("sim control must succeed");
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use simbridge_types::{ActorId, ActuationState, BridgeError, Transform};

use crate::actor::VehicleActor;
use crate::world::{SimClient, World, actor_matches};

// ────────────────────────────────────────────────────────────────────────────
// Stub vehicle
// ────────────────────────────────────────────────────────────────────────────

/// One mutating call received by a [`SimVehicle`].
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    SetTransform(Transform),
    ApplyControl(ActuationState),
    SetSimulatePhysics(bool),
}

#[derive(Debug)]
struct VehicleState {
    transform: Transform,
    control: ActuationState,
    physics: bool,
    calls: Vec<SimCall>,
}

/// A simulated vehicle that records every command.  Succeeds until
/// [`destroy`][Self::destroy] is called, after which every call returns
/// [`BridgeError::ActorGone`].
#[derive(Debug)]
pub struct SimVehicle {
    id: ActorId,
    type_id: String,
    role_name: String,
    alive: AtomicBool,
    state: Mutex<VehicleState>,
}

impl SimVehicle {
    /// Create a vehicle at the origin with physics enabled.
    pub fn new(id: ActorId, type_id: impl Into<String>) -> Self {
        Self {
            id,
            type_id: type_id.into(),
            role_name: String::new(),
            alive: AtomicBool::new(true),
            state: Mutex::new(VehicleState {
                transform: Transform::default(),
                control: ActuationState::default(),
                physics: true,
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = role_name.into();
        self
    }

    /// Start at `transform` instead of the origin.
    pub fn with_transform(self, transform: Transform) -> Self {
        self.lock().transform = transform;
        self
    }

    /// Every mutating call received so far, oldest first.
    pub fn calls(&self) -> Vec<SimCall> {
        self.lock().calls.clone()
    }

    pub fn physics_enabled(&self) -> bool {
        self.lock().physics
    }

    /// Remove the vehicle from the world.
    pub fn destroy(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, VehicleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_state(&self) -> Result<MutexGuard<'_, VehicleState>, BridgeError> {
        if self.is_alive() {
            Ok(self.lock())
        } else {
            Err(BridgeError::ActorGone { actor_id: self.id })
        }
    }
}

impl VehicleActor for SimVehicle {
    fn id(&self) -> ActorId {
        self.id
    }

    fn type_id(&self) -> &str {
        &self.type_id
    }

    fn role_name(&self) -> &str {
        &self.role_name
    }

    fn transform(&self) -> Result<Transform, BridgeError> {
        Ok(self.live_state()?.transform)
    }

    fn set_transform(&self, transform: Transform) -> Result<(), BridgeError> {
        let mut state = self.live_state()?;
        state.transform = transform;
        state.calls.push(SimCall::SetTransform(transform));
        Ok(())
    }

    fn control(&self) -> Result<ActuationState, BridgeError> {
        Ok(self.live_state()?.control)
    }

    fn apply_control(&self, control: ActuationState) -> Result<(), BridgeError> {
        let mut state = self.live_state()?;
        state.control = control;
        state.calls.push(SimCall::ApplyControl(control));
        Ok(())
    }

    fn set_simulate_physics(&self, enabled: bool) -> Result<(), BridgeError> {
        let mut state = self.live_state()?;
        state.physics = enabled;
        state.calls.push(SimCall::SetSimulatePhysics(enabled));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

/// In-process [`World`] populated through `with_*` builder calls.
#[derive(Default)]
pub struct SimWorld {
    vehicles: Vec<Arc<SimVehicle>>,
}

impl SimWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `vehicle` into the world.
    pub fn with_vehicle(mut self, vehicle: SimVehicle) -> Self {
        self.vehicles.push(Arc::new(vehicle));
        self
    }

    /// Concrete handle to the vehicle with `id`, for asserting on its calls.
    pub fn vehicle(&self, id: ActorId) -> Option<Arc<SimVehicle>> {
        self.vehicles.iter().find(|v| v.id == id).cloned()
    }
}

impl World for SimWorld {
    fn actors(&self, filter: &str) -> Vec<Arc<dyn VehicleActor>> {
        self.vehicles
            .iter()
            .filter(|v| v.is_alive() && actor_matches(filter, v.as_ref()))
            .map(|v| Arc::clone(v) as Arc<dyn VehicleActor>)
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LocalSimClient
// ────────────────────────────────────────────────────────────────────────────

/// [`SimClient`] over a [`SimWorld`]; every `wait_for_tick` advances one
/// frame immediately.
pub struct LocalSimClient {
    world: Arc<SimWorld>,
    frame: AtomicU64,
}

impl LocalSimClient {
    pub fn new(world: Arc<SimWorld>) -> Self {
        Self {
            world,
            frame: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl SimClient for LocalSimClient {
    async fn world(&self) -> Result<Arc<dyn World>, BridgeError> {
        Ok(Arc::clone(&self.world) as Arc<dyn World>)
    }

    async fn wait_for_tick(&self, _timeout: Duration) -> Result<u64, BridgeError> {
        Ok(self.frame.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
