//! `simbridge-middleware` – message plumbing and the two adapters.
//!
//! Routes autonomy-stack messages from the rosbridge socket, over the
//! internal bus, into the adapters that actuate the simulated vehicle.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`rosbridge`] – WebSocket client that decodes rosbridge `publish` frames
//!   onto the bus.
//! - [`node`] – [`Node`]: reader registration and synchronous, in-order
//!   callback dispatch.
//! - [`adapter`] – the [`MessageHandler`] contract and error-class logging.
//! - [`control_adapter`] – control commands → rate-limited actuation.
//! - [`planning_adapter`] – trajectories → look-ahead pose injection.

pub mod adapter;
pub mod bus;
pub mod control_adapter;
pub mod node;
pub mod planning_adapter;
pub mod rosbridge;

pub use adapter::{MessageHandler, report_rejection};
pub use bus::{EventBus, Topic, TopicReceiver};
pub use control_adapter::{ControlAdapter, shape_control};
pub use node::{Node, SharedWatchdog};
pub use planning_adapter::{PlanningAdapter, PoseUpdate};
pub use rosbridge::RosbridgeClient;
