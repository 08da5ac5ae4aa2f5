//! `simbridge-runtime` – process-level wiring.
//!
//! # Modules
//!
//! - [`bridge`] – [`run`][bridge::run]: connects to the simulator, resolves
//!   the vehicle, registers the selected adapters, subscribes over rosbridge
//!   and spins until shutdown.  [`assemble`][bridge::assemble] performs the
//!   wiring against any [`SimClient`][simbridge_sim::SimClient].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod bridge;
pub mod telemetry;

pub use bridge::{AdapterSelection, Assembly, BridgeSettings, assemble, run, run_with_client};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
