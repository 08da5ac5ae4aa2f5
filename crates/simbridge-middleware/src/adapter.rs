//! The handler contract every bus reader implements.
//!
//! Adapters never talk to the rosbridge socket.  The
//! [`RosbridgeClient`][crate::rosbridge::RosbridgeClient] publishes decoded
//! messages onto the [`EventBus`][crate::bus::EventBus]; a
//! [`Node`][crate::node::Node] delivers them to each registered
//! [`MessageHandler`] in arrival order.
//!
//! # Overview
//!
//! - [`MessageHandler`] – the trait every adapter must implement.
//! - [`ControlAdapter`][crate::control_adapter::ControlAdapter] – shapes
//!   control commands into actuation state.
//! - [`PlanningAdapter`][crate::planning_adapter::PlanningAdapter] – teleports
//!   the vehicle onto the planned trajectory.
//! - [`report_rejection`] – logs a failed message at the level its error
//!   class calls for.

use simbridge_types::{BridgeError, EventPayload};
use tracing::{debug, error, warn};

/// A synchronous, bounded callback invoked once per bus message.
///
/// # Contract
///
/// * `handle` must not block on I/O; the simulator client queues writes.
/// * An `Err` skips this message only.  The reader keeps delivering.
pub trait MessageHandler: Send {
    /// Stable name used as the mode-arbiter holder and in log fields.
    fn name(&self) -> &str;

    fn handle(&mut self, payload: &EventPayload) -> Result<(), BridgeError>;
}

/// Log a rejected message according to its error class.
///
/// | Class | Level |
/// |---|---|
/// | shape (`TrajectoryTooShort`, `MalformedMessage`, `LookAheadOverrun`) | `warn` |
/// | `ModeConflict` | `debug` |
/// | `ActorGone` and everything else | `error` |
pub fn report_rejection(handler: &str, err: &BridgeError) {
    match err {
        BridgeError::TrajectoryTooShort { .. }
        | BridgeError::MalformedMessage(_)
        | BridgeError::LookAheadOverrun { .. } => {
            warn!(handler, error = %err, "message skipped");
        }
        BridgeError::ModeConflict { .. } => {
            debug!(handler, error = %err, "message skipped, actor held by another adapter");
        }
        _ => {
            error!(handler, error = %err, "failed to apply message");
        }
    }
}

/// Error for a payload routed to the wrong adapter.
pub(crate) fn unexpected_payload(handler: &str, payload: &EventPayload) -> BridgeError {
    let kind = match payload {
        EventPayload::Control(_) => "control",
        EventPayload::Trajectory(_) => "trajectory",
        EventPayload::SystemAlert { .. } => "system alert",
    };
    BridgeError::MalformedMessage(format!("{handler} cannot handle a {kind} payload"))
}
