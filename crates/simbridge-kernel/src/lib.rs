//! `simbridge-kernel` – actuation safety and arbitration.
//!
//! Nothing reaches the simulated vehicle without passing through this crate.
//!
//! # Modules
//!
//! - [`mode_arbiter`] – [`ModeArbiter`][mode_arbiter::ModeArbiter]: the
//!   capability object that owns the actor's physics mode and decides which
//!   adapter may mutate the actor at any moment.
//! - [`message_verifier`] – [`MessageVerifier`][message_verifier::MessageVerifier]:
//!   a rule engine that rejects malformed messages before any actuation.
//! - [`actuation_gate`] – [`ActuationGate`][actuation_gate::ActuationGate]:
//!   the single interception point each adapter passes through, combining
//!   message verification and mode acquisition in one call.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]: tracks per-topic
//!   message arrival and reports topics that fall silent or recover.

pub mod actuation_gate;
pub mod message_verifier;
pub mod mode_arbiter;
pub mod watchdog;

pub use actuation_gate::ActuationGate;
pub use message_verifier::{
    BridgeMessage, FiniteControlRule, FiniteTrajectoryRule, MessageVerifier, Rule,
    TrajectoryLengthRule,
};
pub use mode_arbiter::ModeArbiter;
pub use watchdog::{TopicHealth, TopicTransition, Watchdog};
