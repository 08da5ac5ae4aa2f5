//! Bridge assembly and lifecycle.
//!
//! [`run`] is the whole process after configuration has been resolved:
//!
//! 1. connect to the simulator and obtain the world;
//! 2. wait for one simulation tick so actor state is current;
//! 3. resolve the target vehicle once ([`resolve_vehicle`]);
//! 4. wrap it in a [`ModeArbiter`] and build the selected adapters;
//! 5. subscribe to the autonomy-stack topics over rosbridge;
//! 6. spin the [`Node`] until the shutdown future resolves.
//!
//! Any failure before step 6 is fatal and returned to the caller.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use simbridge_frames::LookAhead;
use simbridge_kernel::{ActuationGate, MessageVerifier, ModeArbiter, TopicTransition, Watchdog};
use simbridge_middleware::{
    ControlAdapter, EventBus, Node, PlanningAdapter, RosbridgeClient, SharedWatchdog, Topic,
};
use simbridge_sim::remote::RemoteSimClient;
use simbridge_sim::{SimClient, resolve_vehicle};
use simbridge_types::{BridgeError, Event, EventPayload};
use tokio::task::JoinHandle;
use tracing::{info, warn};

// ────────────────────────────────────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────────────────────────────────────

/// Which adapters to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterSelection {
    #[default]
    Control,
    Planning,
    Both,
}

impl AdapterSelection {
    pub fn runs_control(self) -> bool {
        matches!(self, AdapterSelection::Control | AdapterSelection::Both)
    }

    pub fn runs_planning(self) -> bool {
        matches!(self, AdapterSelection::Planning | AdapterSelection::Both)
    }
}

impl FromStr for AdapterSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "control" => Ok(AdapterSelection::Control),
            "planning" => Ok(AdapterSelection::Planning),
            "both" => Ok(AdapterSelection::Both),
            other => Err(format!(
                "unknown adapter '{other}' (expected control, planning or both)"
            )),
        }
    }
}

impl fmt::Display for AdapterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdapterSelection::Control => "control",
            AdapterSelection::Planning => "planning",
            AdapterSelection::Both => "both",
        })
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub sim_host: String,
    pub sim_port: u16,
    pub sim_timeout: Duration,
    pub tick_timeout: Duration,
    pub bus_url: String,
    pub actor_filter: String,
    pub control_topic: String,
    pub planning_topic: String,
    pub adapters: AdapterSelection,
    pub throttle_decay_step: f64,
    pub look_ahead: LookAhead,
    pub mode_hold: Duration,
    pub topic_timeout: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            sim_host: "172.17.0.1".to_string(),
            sim_port: 2000,
            sim_timeout: Duration::from_secs(200),
            tick_timeout: Duration::from_secs(5),
            bus_url: "ws://localhost:9090".to_string(),
            actor_filter: "vehicle.lincoln.mkz*".to_string(),
            control_topic: "/apollo/control".to_string(),
            planning_topic: "/apollo/planning".to_string(),
            adapters: AdapterSelection::Control,
            throttle_decay_step: simbridge_middleware::control_adapter::DEFAULT_DECAY_STEP,
            look_ahead: LookAhead::Clamp,
            mode_hold: Duration::from_millis(500),
            topic_timeout: Duration::from_millis(2000),
        }
    }
}

impl BridgeSettings {
    /// Reject values the runtime cannot operate with.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] for a non-positive decay step or a zero
    /// topic timeout.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if !(self.throttle_decay_step.is_finite() && self.throttle_decay_step > 0.0) {
            return Err(BridgeError::Config(format!(
                "throttle decay step must be positive, got {}",
                self.throttle_decay_step
            )));
        }
        if self.topic_timeout.is_zero() {
            return Err(BridgeError::Config(
                "topic timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Assembly
// ────────────────────────────────────────────────────────────────────────────

/// Everything wired up and ready to spin.
pub struct Assembly {
    pub bus: EventBus,
    pub node: Node,
    pub arbiter: Arc<ModeArbiter>,
    pub watchdog: SharedWatchdog,
}

/// Resolve the vehicle through `client` and register the selected adapters
/// on a fresh bus.
///
/// # Errors
///
/// - [`BridgeError::SimConnection`] – no world or no tick within
///   `tick_timeout`.
/// - [`BridgeError::ActorNotFound`] – nothing matches `actor_filter`.
/// - [`BridgeError::Config`] – `settings` failed [`BridgeSettings::validate`].
pub async fn assemble(
    client: &dyn SimClient,
    settings: &BridgeSettings,
) -> Result<Assembly, BridgeError> {
    settings.validate()?;
    let world = client.world().await?;
    let frame = client.wait_for_tick(settings.tick_timeout).await?;
    info!(frame, "simulation ticking");

    let actor = resolve_vehicle(world.as_ref(), &settings.actor_filter)?;
    let arbiter = Arc::new(ModeArbiter::new(actor, settings.mode_hold));

    let bus = EventBus::default();
    let watchdog: SharedWatchdog = Arc::new(Mutex::new(Watchdog::new()));
    let mut node = Node::new("simbridge", bus.clone())
        .with_watchdog(Arc::clone(&watchdog), settings.topic_timeout);

    let gate = || ActuationGate::new(MessageVerifier::with_default_rules(), Arc::clone(&arbiter));
    if settings.adapters.runs_control() {
        node.create_reader(
            Topic::Control,
            Box::new(ControlAdapter::new(gate(), settings.throttle_decay_step)),
        );
    }
    if settings.adapters.runs_planning() {
        node.create_reader(
            Topic::Planning,
            Box::new(PlanningAdapter::new(gate(), settings.look_ahead)),
        );
    }

    Ok(Assembly {
        bus,
        node,
        arbiter,
        watchdog,
    })
}

/// The rosbridge routes matching the selected adapters.
pub fn ingest_client(bus: EventBus, settings: &BridgeSettings) -> RosbridgeClient {
    let mut client = RosbridgeClient::new(bus);
    if settings.adapters.runs_control() {
        client = client.route(settings.control_topic.clone(), Topic::Control);
    }
    if settings.adapters.runs_planning() {
        client = client.route(settings.planning_topic.clone(), Topic::Planning);
    }
    client
}

// ────────────────────────────────────────────────────────────────────────────
// Topic supervision
// ────────────────────────────────────────────────────────────────────────────

/// Log (and announce on [`Topic::SystemAlerts`]) each watchdog transition.
pub fn report_transitions(bus: &EventBus, transitions: &[TopicTransition]) {
    for transition in transitions {
        let (code, message) = match transition {
            TopicTransition::WentSilent(topic) => {
                warn!(topic = %topic, "no messages received within timeout");
                (1, format!("{topic} went silent"))
            }
            TopicTransition::Recovered(topic) => {
                info!(topic = %topic, "messages flowing again");
                (0, format!("{topic} recovered"))
            }
        };
        let alert = Event::new(
            "simbridge-runtime::watchdog",
            EventPayload::SystemAlert {
                component: "watchdog".to_string(),
                code,
                message,
            },
        );
        // Nobody listening is fine.
        let _ = bus.publish_to(Topic::SystemAlerts, alert);
    }
}

/// Check `watchdog` every `period` until aborted.
pub fn spawn_supervisor(bus: EventBus, watchdog: SharedWatchdog, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let transitions = watchdog
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .check_transitions();
            report_transitions(&bus, &transitions);
        }
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ────────────────────────────────────────────────────────────────────────────

/// Run the bridge against the remote simulator until `shutdown` resolves.
pub async fn run<F>(settings: &BridgeSettings, shutdown: F) -> Result<(), BridgeError>
where
    F: Future<Output = ()>,
{
    info!(
        host = %settings.sim_host,
        port = settings.sim_port,
        adapters = %settings.adapters,
        "connecting to simulator"
    );
    let client =
        RemoteSimClient::connect(&settings.sim_host, settings.sim_port, settings.sim_timeout)
            .await?;
    run_with_client(&client, settings, shutdown).await
}

/// [`run`] with an already-connected simulation client.
pub async fn run_with_client<F>(
    client: &dyn SimClient,
    settings: &BridgeSettings,
    shutdown: F,
) -> Result<(), BridgeError>
where
    F: Future<Output = ()>,
{
    let Assembly {
        bus,
        node,
        arbiter: _,
        watchdog,
    } = assemble(client, settings).await?;

    let ingest = ingest_client(bus.clone(), settings)
        .connect(&settings.bus_url, settings.sim_timeout)
        .await?;
    let supervisor = spawn_supervisor(bus, watchdog, settings.topic_timeout);

    node.spin(shutdown).await;

    supervisor.abort();
    ingest.abort();
    info!("bridge stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbridge_sim::sim::{LocalSimClient, SimVehicle, SimWorld};
    use tokio::net::TcpListener;

    fn client() -> LocalSimClient {
        LocalSimClient::new(Arc::new(
            SimWorld::new().with_vehicle(SimVehicle::new(5, "vehicle.lincoln.mkz_2017")),
        ))
    }

    #[test]
    fn adapter_selection_parses() {
        assert_eq!("control".parse::<AdapterSelection>(), Ok(AdapterSelection::Control));
        assert_eq!("Planning".parse::<AdapterSelection>(), Ok(AdapterSelection::Planning));
        assert_eq!("both".parse::<AdapterSelection>(), Ok(AdapterSelection::Both));
        assert!("steering".parse::<AdapterSelection>().is_err());
        assert!(AdapterSelection::Both.runs_control() && AdapterSelection::Both.runs_planning());
        assert!(!AdapterSelection::Control.runs_planning());
    }

    #[tokio::test]
    async fn assemble_registers_selected_readers() {
        let settings = BridgeSettings {
            adapters: AdapterSelection::Both,
            ..BridgeSettings::default()
        };
        let assembly = assemble(&client(), &settings).await.unwrap();
        let topics: Vec<Topic> = assembly.node.readers().iter().map(|r| r.topic()).collect();
        assert_eq!(topics, vec![Topic::Control, Topic::Planning]);
        assert_eq!(assembly.arbiter.actor().id(), 5);
        assert!(assembly.arbiter.current().is_none());
    }

    #[tokio::test]
    async fn assemble_fails_when_no_actor_matches() {
        let settings = BridgeSettings {
            actor_filter: "vehicle.tesla.*".to_string(),
            ..BridgeSettings::default()
        };
        let result = assemble(&client(), &settings).await;
        assert!(matches!(
            result,
            Err(BridgeError::ActorNotFound { filter }) if filter == "vehicle.tesla.*"
        ));
    }

    #[tokio::test]
    async fn zero_topic_timeout_is_rejected_before_anything_starts() {
        let settings = BridgeSettings {
            topic_timeout: Duration::ZERO,
            ..BridgeSettings::default()
        };
        let result = run_with_client(&client(), &settings, async {}).await;
        assert!(matches!(result, Err(BridgeError::Config(msg)) if msg.contains("topic timeout")));

        let bad_step = BridgeSettings {
            throttle_decay_step: 0.0,
            ..BridgeSettings::default()
        };
        assert!(matches!(bad_step.validate(), Err(BridgeError::Config(_))));
        assert!(BridgeSettings::default().validate().is_ok());
    }

    #[test]
    fn ingest_routes_follow_selection() {
        let settings = BridgeSettings {
            adapters: AdapterSelection::Planning,
            ..BridgeSettings::default()
        };
        let frames = ingest_client(EventBus::default(), &settings).subscribe_frames();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("/apollo/planning"));
    }

    #[tokio::test]
    async fn transitions_are_announced_on_system_alerts() {
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        report_transitions(&bus, &[TopicTransition::WentSilent("control".to_string())]);

        let event = alerts.recv().await.unwrap();
        match event.payload {
            EventPayload::SystemAlert { code, message, .. } => {
                assert_eq!(code, 1);
                assert_eq!(message, "control went silent");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_bus_is_a_startup_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let settings = BridgeSettings {
            bus_url: format!("ws://127.0.0.1:{port}"),
            sim_timeout: Duration::from_secs(2),
            ..BridgeSettings::default()
        };
        let result = run_with_client(&client(), &settings, async {}).await;
        assert!(matches!(result, Err(BridgeError::BusConnection(_))));
    }
}
