//! `simbridge-sim` – the simulation-client seam.
//!
//! The rest of the bridge only ever talks to the [`VehicleActor`], [`World`]
//! and [`SimClient`] traits, so the simulator backend can be swapped without
//! touching the adapters.
//!
//! # Modules
//!
//! - [`actor`] – [`VehicleActor`]: pose/control get/set and the physics flag
//!   of one simulated vehicle.
//! - [`world`] – [`World`] and [`SimClient`], plus [`resolve_vehicle`] which
//!   performs the one-time actor lookup at startup.
//! - [`sim`] – in-process [`SimWorld`][sim::SimWorld] that records every call,
//!   used by tests and headless runs.
//! - [`remote`] – [`RemoteSimClient`][remote::RemoteSimClient]: JSON actor
//!   protocol over a WebSocket to a simulator-side endpoint.

pub mod actor;
pub mod remote;
pub mod sim;
pub mod world;

pub use actor::VehicleActor;
pub use world::{SimClient, World, actor_matches, resolve_vehicle};
