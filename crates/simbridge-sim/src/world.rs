//! [`World`] and [`SimClient`] – actor lookup and simulator connection.
//!
//! Actors are looked up once, at startup, with a wildcard filter in the
//! simulator's own style (`vehicle.lincoln.mkz*`, `vehicle.*`).  A filter
//! matches an actor when it matches either its type id or its role name.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use simbridge_types::BridgeError;
use tracing::info;

use crate::actor::VehicleActor;

/// Handle to the simulated world.
pub trait World: Send + Sync {
    /// Every vehicle whose type id or role name matches `filter`, in the
    /// simulator's actor order.
    fn actors(&self, filter: &str) -> Vec<Arc<dyn VehicleActor>>;
}

/// A connected simulation client.
///
/// Connection itself is a constructor on the concrete client (e.g.
/// [`RemoteSimClient::connect`][crate::remote::RemoteSimClient::connect]).
#[async_trait]
pub trait SimClient: Send + Sync {
    /// Obtain the world handle.
    async fn world(&self) -> Result<Arc<dyn World>, BridgeError>;

    /// Wait for the next simulation tick and return its frame number.
    ///
    /// # Errors
    ///
    /// [`BridgeError::SimConnection`] when no tick arrives within `timeout`.
    async fn wait_for_tick(&self, timeout: Duration) -> Result<u64, BridgeError>;
}

/// Resolve the single vehicle an adapter will drive.
///
/// The first match wins.  The returned handle is never re-resolved.
///
/// # Errors
///
/// [`BridgeError::ActorNotFound`] when nothing matches `filter`.
pub fn resolve_vehicle(
    world: &dyn World,
    filter: &str,
) -> Result<Arc<dyn VehicleActor>, BridgeError> {
    let mut candidates = world.actors(filter);
    if candidates.is_empty() {
        return Err(BridgeError::ActorNotFound {
            filter: filter.to_string(),
        });
    }
    let actor = candidates.swap_remove(0);
    info!(
        actor_id = actor.id(),
        type_id = actor.type_id(),
        matches = candidates.len() + 1,
        "resolved target vehicle"
    );
    Ok(actor)
}

/// Does `actor` match `filter`?
pub fn actor_matches(filter: &str, actor: &dyn VehicleActor) -> bool {
    wildcard_match(filter, actor.type_id())
        || (!actor.role_name().is_empty() && wildcard_match(filter, actor.role_name()))
}

/// Shell-style matching: `*` spans any run of characters, `?` exactly one.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Position of the last `*` seen and the text index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
