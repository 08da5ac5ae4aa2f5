//! WebSocket simulation client.
//!
//! [`RemoteSimClient`] speaks a small JSON actor protocol to a
//! simulator-side endpoint at `ws://host:port`:
//!
//! * **Outbound** – `list_actors`, `set_transform`, `apply_control` and
//!   `set_simulate_physics` commands, one JSON text frame each.
//! * **Inbound** – `actors` snapshots, per-actor `actor_state` updates,
//!   `actor_destroyed` notices and `tick` frames.
//!
//! Inbound frames keep a shared actor cache current.  Outbound commands are
//! queued onto an unbounded channel drained by a writer task, so
//! [`VehicleActor`] calls never wait on the socket.  Reads are served from
//! the cache, which is updated optimistically on every write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use simbridge_types::{ActorId, ActuationState, BridgeError, Transform};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, warn};

use crate::actor::VehicleActor;
use crate::world::{SimClient, World, actor_matches};

// ────────────────────────────────────────────────────────────────────────────
// Wire frames
// ────────────────────────────────────────────────────────────────────────────

/// Last known state of one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub type_id: String,
    #[serde(default)]
    pub role_name: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub control: ActuationState,
}

/// Frames sent to the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SimCommand {
    ListActors,
    SetTransform {
        actor_id: ActorId,
        transform: Transform,
    },
    ApplyControl {
        actor_id: ActorId,
        control: ActuationState,
    },
    SetSimulatePhysics {
        actor_id: ActorId,
        enabled: bool,
    },
}

/// Frames received from the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SimUpdate {
    Actors { actors: Vec<ActorSnapshot> },
    ActorState { actor: ActorSnapshot },
    ActorDestroyed { actor_id: ActorId },
    Tick { frame: u64 },
}

// ────────────────────────────────────────────────────────────────────────────
// Actor cache
// ────────────────────────────────────────────────────────────────────────────

/// Ordered cache of live actors keyed by id.
#[derive(Debug, Default)]
struct ActorCache {
    order: Vec<ActorId>,
    actors: HashMap<ActorId, ActorSnapshot>,
}

impl ActorCache {
    fn apply(&mut self, update: SimUpdate) {
        match update {
            SimUpdate::Actors { actors } => {
                self.order = actors.iter().map(|a| a.id).collect();
                self.actors = actors.into_iter().map(|a| (a.id, a)).collect();
            }
            SimUpdate::ActorState { actor } => {
                if !self.actors.contains_key(&actor.id) {
                    self.order.push(actor.id);
                }
                self.actors.insert(actor.id, actor);
            }
            SimUpdate::ActorDestroyed { actor_id } => {
                self.actors.remove(&actor_id);
                self.order.retain(|id| *id != actor_id);
            }
            SimUpdate::Tick { .. } => {}
        }
    }
}

type SharedCache = Arc<Mutex<ActorCache>>;

fn lock(cache: &SharedCache) -> MutexGuard<'_, ActorCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// RemoteSimClient
// ────────────────────────────────────────────────────────────────────────────

/// [`SimClient`] backed by a WebSocket connection to the simulator.
pub struct RemoteSimClient {
    cache: SharedCache,
    commands: mpsc::UnboundedSender<SimCommand>,
    snapshot_rx: watch::Receiver<bool>,
    tick_rx: watch::Receiver<u64>,
    timeout: Duration,
}

impl RemoteSimClient {
    /// Connect to `ws://host:port` and request an actor snapshot.
    ///
    /// `timeout` bounds the handshake and, later, [`SimClient::world`]'s wait
    /// for the first snapshot.
    ///
    /// # Errors
    ///
    /// [`BridgeError::SimConnection`] when the endpoint is unreachable or the
    /// handshake does not finish within `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, BridgeError> {
        let url = format!("ws://{host}:{port}");
        let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| BridgeError::SimConnection(format!("timed out connecting to {url}")))?
            .map_err(|e| BridgeError::SimConnection(format!("{url}: {e}")))?;

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let cache: SharedCache = Arc::default();
        let (commands, mut command_rx) = mpsc::unbounded_channel::<SimCommand>();
        let (snapshot_tx, snapshot_rx) = watch::channel(false);
        let (tick_tx, tick_rx) = watch::channel(0u64);

        // Writer: drain queued commands onto the socket.
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                let json = match serde_json::to_string(&command) {
                    Ok(json) => json,
                    Err(e) => {
                        error!(error = %e, "failed to encode simulator command");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                    error!(error = %e, "simulator connection closed while sending");
                    break;
                }
            }
        });

        // Reader: keep the actor cache current.
        let reader_cache = Arc::clone(&cache);
        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let update = match serde_json::from_str::<SimUpdate>(text.as_str()) {
                    Ok(update) => update,
                    Err(e) => {
                        warn!(error = %e, "ignoring unrecognised simulator frame");
                        continue;
                    }
                };
                let mut snapshot_ready = false;
                let mut tick = None;
                match &update {
                    SimUpdate::Tick { frame } => tick = Some(*frame),
                    SimUpdate::Actors { actors } => {
                        debug!(count = actors.len(), "actor snapshot received");
                        snapshot_ready = true;
                    }
                    SimUpdate::ActorDestroyed { actor_id } => {
                        warn!(actor_id, "simulator reports actor destroyed");
                    }
                    SimUpdate::ActorState { .. } => {}
                }
                // Cache first so waiters never observe a stale world.
                lock(&reader_cache).apply(update);
                if snapshot_ready {
                    let _ = snapshot_tx.send(true);
                }
                if let Some(frame) = tick {
                    let _ = tick_tx.send(frame);
                }
            }
            // Connection gone: every cached actor is unreachable now.
            *lock(&reader_cache) = ActorCache::default();
            warn!("simulator connection closed");
        });

        commands
            .send(SimCommand::ListActors)
            .map_err(|_| BridgeError::SimConnection("command channel closed".to_string()))?;

        Ok(Self {
            cache,
            commands,
            snapshot_rx,
            tick_rx,
            timeout,
        })
    }
}

#[async_trait]
impl SimClient for RemoteSimClient {
    async fn world(&self) -> Result<Arc<dyn World>, BridgeError> {
        let mut snapshot_rx = self.snapshot_rx.clone();
        let first_snapshot = async { snapshot_rx.wait_for(|ready| *ready).await.map(|_| ()) };
        tokio::time::timeout(self.timeout, first_snapshot)
            .await
            .map_err(|_| BridgeError::SimConnection("no actor snapshot received".to_string()))?
            .map_err(|_| BridgeError::SimConnection("simulator connection closed".to_string()))?;
        Ok(Arc::new(RemoteWorld {
            cache: Arc::clone(&self.cache),
            commands: self.commands.clone(),
        }))
    }

    async fn wait_for_tick(&self, timeout: Duration) -> Result<u64, BridgeError> {
        let mut tick_rx = self.tick_rx.clone();
        tick_rx.borrow_and_update();
        tokio::time::timeout(timeout, tick_rx.changed())
            .await
            .map_err(|_| BridgeError::SimConnection(format!("no tick within {timeout:?}")))?
            .map_err(|_| BridgeError::SimConnection("simulator connection closed".to_string()))?;
        let frame = *tick_rx.borrow();
        Ok(frame)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RemoteWorld / RemoteVehicle
// ────────────────────────────────────────────────────────────────────────────

struct RemoteWorld {
    cache: SharedCache,
    commands: mpsc::UnboundedSender<SimCommand>,
}

impl World for RemoteWorld {
    fn actors(&self, filter: &str) -> Vec<Arc<dyn VehicleActor>> {
        let cache = lock(&self.cache);
        cache
            .order
            .iter()
            .filter_map(|id| cache.actors.get(id))
            .map(|snapshot| RemoteVehicle {
                id: snapshot.id,
                type_id: snapshot.type_id.clone(),
                role_name: snapshot.role_name.clone(),
                cache: Arc::clone(&self.cache),
                commands: self.commands.clone(),
            })
            .filter(|vehicle| actor_matches(filter, vehicle))
            .map(|vehicle| Arc::new(vehicle) as Arc<dyn VehicleActor>)
            .collect()
    }
}

/// Handle to one actor on the remote simulator.
pub struct RemoteVehicle {
    id: ActorId,
    type_id: String,
    role_name: String,
    cache: SharedCache,
    commands: mpsc::UnboundedSender<SimCommand>,
}

impl RemoteVehicle {
    fn with_snapshot<T>(
        &self,
        f: impl FnOnce(&mut ActorSnapshot) -> T,
    ) -> Result<T, BridgeError> {
        let mut cache = lock(&self.cache);
        cache
            .actors
            .get_mut(&self.id)
            .map(f)
            .ok_or(BridgeError::ActorGone { actor_id: self.id })
    }

    fn send(&self, command: SimCommand) -> Result<(), BridgeError> {
        self.commands
            .send(command)
            .map_err(|_| BridgeError::ActorGone { actor_id: self.id })
    }
}

impl VehicleActor for RemoteVehicle {
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
        self.with_snapshot(|s| s.transform)
    }

    fn set_transform(&self, transform: Transform) -> Result<(), BridgeError> {
        self.with_snapshot(|s| s.transform = transform)?;
        self.send(SimCommand::SetTransform {
            actor_id: self.id,
            transform,
        })
    }

    fn control(&self) -> Result<ActuationState, BridgeError> {
        self.with_snapshot(|s| s.control)
    }

    fn apply_control(&self, control: ActuationState) -> Result<(), BridgeError> {
        self.with_snapshot(|s| s.control = control)?;
        self.send(SimCommand::ApplyControl {
            actor_id: self.id,
            control,
        })
    }

    fn set_simulate_physics(&self, enabled: bool) -> Result<(), BridgeError> {
        self.with_snapshot(|_| ())?;
        self.send(SimCommand::SetSimulatePhysics {
            actor_id: self.id,
            enabled,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use simbridge_types::Location;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn snapshot(id: ActorId, type_id: &str) -> ActorSnapshot {
        ActorSnapshot {
            id,
            type_id: type_id.to_string(),
            role_name: String::new(),
            transform: Transform::default(),
            control: ActuationState::default(),
        }
    }

    #[test]
    fn command_frames_are_tagged_by_op() {
        let json = serde_json::to_string(&SimCommand::SetSimulatePhysics {
            actor_id: 3,
            enabled: false,
        })
        .unwrap();
        assert!(json.contains(r#""op":"set_simulate_physics""#));
        assert!(json.contains(r#""actor_id":3"#));
    }

    #[test]
    fn update_frames_decode() {
        let raw = r#"{"op":"actors","actors":[{"id":5,"type_id":"vehicle.lincoln.mkz_2020","role_name":"hero"}]}"#;
        let update: SimUpdate = serde_json::from_str(raw).unwrap();
        match update {
            SimUpdate::Actors { actors } => {
                assert_eq!(actors.len(), 1);
                assert_eq!(actors[0].role_name, "hero");
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn cache_tracks_snapshot_state_and_destruction() {
        let mut cache = ActorCache::default();
        cache.apply(SimUpdate::Actors {
            actors: vec![snapshot(1, "vehicle.a"), snapshot(2, "vehicle.b")],
        });
        let mut moved = snapshot(2, "vehicle.b");
        moved.transform.location = Location::new(4.0, 4.0, 0.0);
        cache.apply(SimUpdate::ActorState { actor: moved });
        cache.apply(SimUpdate::ActorState {
            actor: snapshot(3, "vehicle.c"),
        });
        cache.apply(SimUpdate::ActorDestroyed { actor_id: 1 });

        assert_eq!(cache.order, vec![2, 3]);
        assert_eq!(cache.actors[&2].transform.location.x, 4.0);
        assert!(!cache.actors.contains_key(&1));
    }

    #[test]
    fn remote_vehicle_queues_commands_and_updates_cache() {
        let cache: SharedCache = Arc::default();
        lock(&cache).apply(SimUpdate::Actors {
            actors: vec![snapshot(8, "vehicle.lincoln.mkz_2020")],
        });
        let (commands, mut command_rx) = mpsc::unbounded_channel();
        let world = RemoteWorld {
            cache: Arc::clone(&cache),
            commands,
        };

        let actors = world.actors("vehicle.lincoln.mkz*");
        assert_eq!(actors.len(), 1);
        let actor = &actors[0];

        let control = ActuationState {
            throttle: 0.3,
            ..ActuationState::default()
        };
        actor.apply_control(control).unwrap();
        assert_eq!(actor.control().unwrap(), control);
        assert_eq!(
            command_rx.try_recv().unwrap(),
            SimCommand::ApplyControl {
                actor_id: 8,
                control
            }
        );

        lock(&cache).apply(SimUpdate::ActorDestroyed { actor_id: 8 });
        assert_eq!(
            actor.set_simulate_physics(true),
            Err(BridgeError::ActorGone { actor_id: 8 })
        );
        assert!(command_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn connect_fails_fast_when_unreachable() {
        // Bind then drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = RemoteSimClient::connect("127.0.0.1", port, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(BridgeError::SimConnection(_))));
    }

    #[tokio::test]
    async fn client_requests_snapshot_and_resolves_world() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            let first = ws.next().await.unwrap().unwrap();
            let command: SimCommand = serde_json::from_str(first.to_text().unwrap()).unwrap();
            assert_eq!(command, SimCommand::ListActors);

            let reply = SimUpdate::Actors {
                actors: vec![snapshot(11, "vehicle.lincoln.mkz_2020")],
            };
            ws.send(Message::Text(serde_json::to_string(&reply).unwrap().into()))
                .await
                .unwrap();
            ws.send(Message::Text(
                serde_json::to_string(&SimUpdate::Tick { frame: 42 }).unwrap().into(),
            ))
            .await
            .unwrap();

            let next = ws.next().await.unwrap().unwrap();
            serde_json::from_str::<SimCommand>(next.to_text().unwrap()).unwrap()
        });

        let client = RemoteSimClient::connect("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap();
        let world = client.world().await.unwrap();
        let actor = crate::world::resolve_vehicle(world.as_ref(), "vehicle.lincoln.mkz*").unwrap();
        assert_eq!(actor.id(), 11);

        actor.set_simulate_physics(false).unwrap();
        let received = server.await.unwrap();
        assert_eq!(
            received,
            SimCommand::SetSimulatePhysics {
                actor_id: 11,
                enabled: false
            }
        );
    }
}
