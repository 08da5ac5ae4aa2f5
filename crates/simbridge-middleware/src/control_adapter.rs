//! Control adapter: control commands → vehicle actuation.
//!
//! Each [`ControlMessage`] is verified, control-injection mode is acquired
//! (physics on), and the normalised fields are shaped into an
//! [`ActuationState`] applied with a single `apply_control` call.
//!
//! Throttle is rate-limited on the way down only: it may rise instantly but
//! falls by at most `decay_step` per message.

use simbridge_kernel::{ActuationGate, BridgeMessage};
use simbridge_types::{
    ActuationMode, ActuationState, BridgeError, ControlMessage, EventPayload, GearPosition,
};
use tracing::{debug, instrument};

use crate::adapter::{MessageHandler, unexpected_payload};

/// Default per-message throttle decay.
pub const DEFAULT_DECAY_STEP: f64 = 0.01;

/// Map a raw control command onto simulator actuation.
///
/// `previous_throttle` is the throttle last applied successfully (0 before
/// the first message).
///
/// # Example
///
/// ```
/// use simbridge_middleware::control_adapter::shape_control;
/// use simbridge_types::ControlMessage;
///
/// let command = ControlMessage {
///     throttle: 50.0,
///     brake: 20.0,
///     steering_target: 30.0,
///     ..ControlMessage::default()
/// };
/// let state = shape_control(&command, 0.6, 0.01);
/// assert!((state.throttle - 0.59).abs() < 1e-9);
/// assert!((state.brake - 0.2).abs() < 1e-9);
/// assert!((state.steer + 0.3).abs() < 1e-9);
/// ```
pub fn shape_control(
    command: &ControlMessage,
    previous_throttle: f64,
    decay_step: f64,
) -> ActuationState {
    let reverse = command.gear_location == GearPosition::Reverse;
    ActuationState {
        throttle: (previous_throttle - decay_step)
            .max(command.throttle / 100.0)
            .clamp(0.0, 1.0),
        brake: (command.brake / 100.0).clamp(0.0, 1.0),
        steer: (-command.steering_target / 100.0).clamp(-1.0, 1.0),
        hand_brake: command.parking_brake,
        reverse,
        gear: if reverse { -1 } else { 1 },
    }
}

/// Applies control commands to the gated vehicle.
pub struct ControlAdapter {
    gate: ActuationGate,
    decay_step: f64,
    previous: ActuationState,
    applied: u64,
}

impl ControlAdapter {
    pub const HOLDER: &'static str = "control";

    pub fn new(gate: ActuationGate, decay_step: f64) -> Self {
        Self {
            gate,
            decay_step,
            previous: ActuationState::default(),
            applied: 0,
        }
    }

    /// The last state applied successfully.
    pub fn previous(&self) -> ActuationState {
        self.previous
    }

    /// Number of commands applied so far.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Verify, shape and apply one command, returning the applied state.
    ///
    /// The previous state is updated only when the apply succeeds.
    #[instrument(name = "control", skip_all, fields(seq = self.applied))]
    pub fn on_control(&mut self, command: &ControlMessage) -> Result<ActuationState, BridgeError> {
        let actor = self.gate.admit(
            Self::HOLDER,
            ActuationMode::ControlInjection,
            BridgeMessage::Control(command),
        )?;

        let state = shape_control(command, self.previous.throttle, self.decay_step);
        actor.apply_control(state)?;

        debug!(
            actor_id = actor.id(),
            throttle = state.throttle,
            brake = state.brake,
            steer = state.steer,
            hand_brake = state.hand_brake,
            reverse = state.reverse,
            "control applied"
        );
        self.previous = state;
        self.applied += 1;
        Ok(state)
    }
}

impl MessageHandler for ControlAdapter {
    fn name(&self) -> &str {
        Self::HOLDER
    }

    fn handle(&mut self, payload: &EventPayload) -> Result<(), BridgeError> {
        match payload {
            EventPayload::Control(command) => self.on_control(command).map(|_| ()),
            other => Err(unexpected_payload(Self::HOLDER, other)),
        }
    }
}

/// Hands the actor back when the reader owning this adapter goes away.
impl Drop for ControlAdapter {
    fn drop(&mut self) {
        self.gate.release(Self::HOLDER);
    }
}
