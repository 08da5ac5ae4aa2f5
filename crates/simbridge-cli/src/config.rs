//! Configuration file – reads `~/.simbridge/config.toml`.
//!
//! Precedence, lowest first: built-in defaults, the file, `SIMBRIDGE_*`
//! environment variables, command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use simbridge_frames::LookAhead;
use simbridge_runtime::{AdapterSelection, BridgeSettings};

/// Persisted configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Simulator host.
    #[serde(default = "default_sim_host")]
    pub sim_host: String,

    #[serde(default = "default_sim_port")]
    pub sim_port: u16,

    /// Connection and first-snapshot timeout.
    #[serde(default = "default_sim_timeout_secs")]
    pub sim_timeout_secs: u64,

    #[serde(default = "default_tick_timeout_secs")]
    pub tick_timeout_secs: u64,

    /// rosbridge WebSocket URL of the autonomy stack.
    #[serde(default = "default_bus_url")]
    pub bus_url: String,

    /// Wildcard matched against actor type ids and role names.
    #[serde(default = "default_actor_filter")]
    pub actor_filter: String,

    #[serde(default = "default_control_topic")]
    pub control_topic: String,

    #[serde(default = "default_planning_topic")]
    pub planning_topic: String,

    /// Maximum throttle drop per control message.
    #[serde(default = "default_throttle_decay_step")]
    pub throttle_decay_step: f64,

    /// `clamp` or `skip`.
    #[serde(default = "default_look_ahead")]
    pub look_ahead: String,

    #[serde(default = "default_mode_hold_ms")]
    pub mode_hold_ms: u64,

    #[serde(default = "default_topic_timeout_ms")]
    pub topic_timeout_ms: u64,
}

fn default_sim_host() -> String {
    "172.17.0.1".to_string()
}
fn default_sim_port() -> u16 {
    2000
}
fn default_sim_timeout_secs() -> u64 {
    200
}
fn default_tick_timeout_secs() -> u64 {
    5
}
fn default_bus_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_actor_filter() -> String {
    "vehicle.lincoln.mkz*".to_string()
}
fn default_control_topic() -> String {
    "/apollo/control".to_string()
}
fn default_planning_topic() -> String {
    "/apollo/planning".to_string()
}
fn default_throttle_decay_step() -> f64 {
    0.01
}
fn default_look_ahead() -> String {
    "clamp".to_string()
}
fn default_mode_hold_ms() -> u64 {
    500
}
fn default_topic_timeout_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sim_host: default_sim_host(),
            sim_port: default_sim_port(),
            sim_timeout_secs: default_sim_timeout_secs(),
            tick_timeout_secs: default_tick_timeout_secs(),
            bus_url: default_bus_url(),
            actor_filter: default_actor_filter(),
            control_topic: default_control_topic(),
            planning_topic: default_planning_topic(),
            throttle_decay_step: default_throttle_decay_step(),
            look_ahead: default_look_ahead(),
            mode_hold_ms: default_mode_hold_ms(),
            topic_timeout_ms: default_topic_timeout_ms(),
        }
    }
}

impl Config {
    /// Validate and convert into runtime settings.
    pub fn to_settings(&self, adapters: AdapterSelection) -> Result<BridgeSettings, String> {
        if !(self.throttle_decay_step.is_finite() && self.throttle_decay_step > 0.0) {
            return Err(format!(
                "throttle_decay_step must be a positive number, got {}",
                self.throttle_decay_step
            ));
        }
        if self.topic_timeout_ms == 0 {
            return Err("topic_timeout_ms must be greater than zero".to_string());
        }
        let look_ahead: LookAhead = self.look_ahead.parse()?;

        Ok(BridgeSettings {
            sim_host: self.sim_host.clone(),
            sim_port: self.sim_port,
            sim_timeout: Duration::from_secs(self.sim_timeout_secs),
            tick_timeout: Duration::from_secs(self.tick_timeout_secs),
            bus_url: self.bus_url.clone(),
            actor_filter: self.actor_filter.clone(),
            control_topic: self.control_topic.clone(),
            planning_topic: self.planning_topic.clone(),
            adapters,
            throttle_decay_step: self.throttle_decay_step,
            look_ahead,
            mode_hold: Duration::from_millis(self.mode_hold_ms),
            topic_timeout: Duration::from_millis(self.topic_timeout_ms),
        })
    }
}

/// Return the path to `~/.simbridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".simbridge").join("config.toml")
}

/// Load `path` (defaults when it does not exist), then apply environment
/// overrides.
pub fn load(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse the file at `path`.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config at {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

/// Apply `SIMBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SIMBRIDGE_SIM_HOST` | `sim_host` |
/// | `SIMBRIDGE_SIM_PORT` | `sim_port` |
/// | `SIMBRIDGE_SIM_TIMEOUT_SECS` | `sim_timeout_secs` |
/// | `SIMBRIDGE_TICK_TIMEOUT_SECS` | `tick_timeout_secs` |
/// | `SIMBRIDGE_BUS_URL` | `bus_url` |
/// | `SIMBRIDGE_ACTOR_FILTER` | `actor_filter` |
/// | `SIMBRIDGE_CONTROL_TOPIC` | `control_topic` |
/// | `SIMBRIDGE_PLANNING_TOPIC` | `planning_topic` |
/// | `SIMBRIDGE_THROTTLE_DECAY_STEP` | `throttle_decay_step` |
/// | `SIMBRIDGE_LOOK_AHEAD` | `look_ahead` |
/// | `SIMBRIDGE_MODE_HOLD_MS` | `mode_hold_ms` |
/// | `SIMBRIDGE_TOPIC_TIMEOUT_MS` | `topic_timeout_ms` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("SIMBRIDGE_SIM_HOST") {
        cfg.sim_host = v;
    }
    if let Some(v) = lookup("SIMBRIDGE_SIM_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.sim_port = port;
    }
    if let Some(v) = lookup("SIMBRIDGE_SIM_TIMEOUT_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.sim_timeout_secs = secs;
    }
    if let Some(v) = lookup("SIMBRIDGE_TICK_TIMEOUT_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.tick_timeout_secs = secs;
    }
    if let Some(v) = lookup("SIMBRIDGE_BUS_URL") {
        cfg.bus_url = v;
    }
    if let Some(v) = lookup("SIMBRIDGE_ACTOR_FILTER") {
        cfg.actor_filter = v;
    }
    if let Some(v) = lookup("SIMBRIDGE_CONTROL_TOPIC") {
        cfg.control_topic = v;
    }
    if let Some(v) = lookup("SIMBRIDGE_PLANNING_TOPIC") {
        cfg.planning_topic = v;
    }
    if let Some(v) = lookup("SIMBRIDGE_THROTTLE_DECAY_STEP")
        && let Ok(step) = v.parse::<f64>()
    {
        cfg.throttle_decay_step = step;
    }
    if let Some(v) = lookup("SIMBRIDGE_LOOK_AHEAD") {
        cfg.look_ahead = v;
    }
    if let Some(v) = lookup("SIMBRIDGE_MODE_HOLD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.mode_hold_ms = ms;
    }
    if let Some(v) = lookup("SIMBRIDGE_TOPIC_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.topic_timeout_ms = ms;
    }
}
