//! [`ActuationGate`] – single interception point between an adapter and the
//! simulated vehicle.
//!
//! Before an adapter mutates its actor it must pass through
//! [`ActuationGate::admit`], which enforces two checks in order:
//!
//! 1. **Shape check** ([`MessageVerifier`]): the inbound message must satisfy
//!    every registered [`Rule`][crate::message_verifier::Rule].  A rejected
//!    message never touches the actor or the mode lease.
//! 2. **Mode check** ([`ModeArbiter`]): the adapter must win the actuation
//!    mode it needs.  A competing holder inside its hold window yields
//!    [`BridgeError::ModeConflict`].
//!
//! Only when both pass does the caller receive the actor handle.  Callers
//! that must read the actor before committing to a mode use
//! [`inspect`][ActuationGate::inspect] and then
//! [`acquire`][ActuationGate::acquire].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use simbridge_kernel::{ActuationGate, BridgeMessage, MessageVerifier, ModeArbiter};
//! use simbridge_sim::sim::SimVehicle;
//! use simbridge_types::{ActuationMode, ControlMessage};
//!
//! let vehicle = Arc::new(SimVehicle::new(1, "vehicle.lincoln.mkz_2020"));
//! let arbiter = Arc::new(ModeArbiter::new(vehicle, Duration::from_millis(500)));
//! let gate = ActuationGate::new(MessageVerifier::with_default_rules(), arbiter);
//!
//! let msg = ControlMessage::default();
//! let actor = gate
//!     .admit("control", ActuationMode::ControlInjection, BridgeMessage::Control(&msg))
//!     .unwrap();
//! assert_eq!(actor.id(), 1);
//! ```

use std::sync::Arc;

use simbridge_sim::VehicleActor;
use simbridge_types::{ActuationMode, BridgeError};

use crate::message_verifier::{BridgeMessage, MessageVerifier};
use crate::mode_arbiter::ModeArbiter;

/// Verifier plus a shared [`ModeArbiter`].  Each adapter owns one gate; the
/// arbiter is shared by every gate guarding the same actor.
pub struct ActuationGate {
    verifier: MessageVerifier,
    arbiter: Arc<ModeArbiter>,
}

impl ActuationGate {
    pub fn new(verifier: MessageVerifier, arbiter: Arc<ModeArbiter>) -> Self {
        Self { verifier, arbiter }
    }

    /// Verify `message`, then acquire `mode` for `holder`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::TrajectoryTooShort`] / [`BridgeError::MalformedMessage`]
    ///   – the message failed a shape rule.
    /// - [`BridgeError::ModeConflict`] – another adapter holds the actor.
    /// - [`BridgeError::ActorGone`] – the physics switch hit a destroyed actor.
    pub fn admit(
        &self,
        holder: &str,
        mode: ActuationMode,
        message: BridgeMessage<'_>,
    ) -> Result<&Arc<dyn VehicleActor>, BridgeError> {
        self.inspect(message)?;
        self.acquire(holder, mode)
    }

    /// Verify `message` and hand out the actor for reading only.  Neither the
    /// lease nor the physics flag is touched.
    pub fn inspect(&self, message: BridgeMessage<'_>) -> Result<&Arc<dyn VehicleActor>, BridgeError> {
        self.verifier.verify(message)?;
        Ok(self.arbiter.actor())
    }

    /// The mode half of [`admit`][Self::admit], for callers that already
    /// passed [`inspect`][Self::inspect].
    pub fn acquire(
        &self,
        holder: &str,
        mode: ActuationMode,
    ) -> Result<&Arc<dyn VehicleActor>, BridgeError> {
        self.arbiter.acquire(holder, mode)?;
        Ok(self.arbiter.actor())
    }

    /// Give up `holder`'s lease.
    pub fn release(&self, holder: &str) {
        self.arbiter.release(holder);
    }

    pub fn arbiter(&self) -> &Arc<ModeArbiter> {
        &self.arbiter
    }
}
