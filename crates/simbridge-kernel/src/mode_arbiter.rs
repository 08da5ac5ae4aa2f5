//! [`ModeArbiter`] – explicit ownership of a vehicle's actuation mode.
//!
//! Pose injection needs the physics engine off; control injection needs it
//! on.  Letting two adapters flip the flag independently makes the last
//! writer win, so the flag is owned here instead.  An adapter must
//! [`acquire`][ModeArbiter::acquire] its mode before touching the actor:
//!
//! * the physics flag is written only when the mode actually changes;
//! * the current holder keeps the actor for `hold` after its last
//!   acquisition, and a different adapter asking inside that window gets
//!   [`BridgeError::ModeConflict`];
//! * once the window lapses (or the holder [`release`][ModeArbiter::release]s)
//!   the next requester takes over.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use simbridge_kernel::ModeArbiter;
//! use simbridge_sim::sim::SimVehicle;
//! use simbridge_types::{ActuationMode, BridgeError};
//!
//! let vehicle = Arc::new(SimVehicle::new(1, "vehicle.lincoln.mkz_2020"));
//! let arbiter = ModeArbiter::new(vehicle.clone(), Duration::from_secs(60));
//!
//! arbiter.acquire("planning", ActuationMode::PoseInjection).unwrap();
//! assert!(!vehicle.physics_enabled());
//!
//! let denied = arbiter.acquire("control", ActuationMode::ControlInjection);
//! assert!(matches!(denied, Err(BridgeError::ModeConflict { .. })));
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use simbridge_sim::VehicleActor;
use simbridge_types::{ActuationMode, BridgeError};
use tracing::info;

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    mode: ActuationMode,
    last_active: Instant,
}

/// Capability object guarding one vehicle actor.
pub struct ModeArbiter {
    actor: Arc<dyn VehicleActor>,
    hold: Duration,
    lease: Mutex<Option<Lease>>,
}

impl ModeArbiter {
    /// Guard `actor`; a holder keeps it for `hold` after its last activity.
    pub fn new(actor: Arc<dyn VehicleActor>, hold: Duration) -> Self {
        Self {
            actor,
            hold,
            lease: Mutex::new(None),
        }
    }

    /// The guarded actor.  Callers must hold a lease before mutating it.
    pub fn actor(&self) -> &Arc<dyn VehicleActor> {
        &self.actor
    }

    /// Acquire (or refresh) `mode` for `holder`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ModeConflict`] – another holder is active within the
    ///   hold window.
    /// - Any error from the actor while switching the physics flag; the lease
    ///   is left unchanged in that case.
    pub fn acquire(&self, holder: &str, mode: ActuationMode) -> Result<(), BridgeError> {
        let mut lease = self.lock();

        if let Some(current) = lease.as_ref()
            && current.holder != holder
            && current.last_active.elapsed() < self.hold
        {
            return Err(BridgeError::ModeConflict {
                requested: mode,
                holder: current.holder.clone(),
            });
        }

        let previous = lease.as_ref().map(|l| l.mode);
        if previous != Some(mode) {
            self.actor.set_simulate_physics(mode.physics_enabled())?;
            info!(
                actor_id = self.actor.id(),
                holder,
                %mode,
                physics = mode.physics_enabled(),
                "actuation mode switched"
            );
        }

        *lease = Some(Lease {
            holder: holder.to_string(),
            mode,
            last_active: Instant::now(),
        });
        Ok(())
    }

    /// Drop `holder`'s lease so another adapter can take over immediately.
    /// No-ops when `holder` does not hold the actor.
    ///
    /// The physics flag is left as it is; the next holder sets its own.
    pub fn release(&self, holder: &str) {
        let mut lease = self.lock();
        if lease.as_ref().is_some_and(|l| l.holder == holder) {
            *lease = None;
        }
    }

    /// Current holder and mode, if any.
    pub fn current(&self) -> Option<(String, ActuationMode)> {
        self.lock().as_ref().map(|l| (l.holder.clone(), l.mode))
    }

    fn lock(&self) -> MutexGuard<'_, Option<Lease>> {
        self.lease.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
