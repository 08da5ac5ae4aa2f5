use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Simulator-assigned actor identifier.
pub type ActorId = u32;

// ────────────────────────────────────────────────────────────────────────────
// Simulator-frame value types
// ────────────────────────────────────────────────────────────────────────────

/// A position in the simulator frame (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Orientation in the simulator frame, all angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Full simulator pose of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub location: Location,
    pub rotation: Rotation,
}

impl Transform {
    pub fn new(location: Location, rotation: Rotation) -> Self {
        Self { location, rotation }
    }
}

/// Simulator-native control vector applied to a vehicle actor.
///
/// `throttle` and `brake` live in `[0, 1]`, `steer` in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActuationState {
    pub throttle: f64,
    pub brake: f64,
    pub steer: f64,
    pub hand_brake: bool,
    pub reverse: bool,
    pub gear: i32,
}

/// Which of the two mutually exclusive actuation modes owns a vehicle actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActuationMode {
    /// Poses are assigned directly; the physics engine must be off.
    PoseInjection,
    /// Control vectors are applied; the physics engine must be on.
    ControlInjection,
}

impl ActuationMode {
    /// The physics-simulation flag this mode requires on the actor.
    pub fn physics_enabled(self) -> bool {
        matches!(self, ActuationMode::ControlInjection)
    }
}

impl std::fmt::Display for ActuationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActuationMode::PoseInjection => write!(f, "pose-injection"),
            ActuationMode::ControlInjection => write!(f, "control-injection"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Autonomy-stack messages
// ────────────────────────────────────────────────────────────────────────────

/// Chassis gear position as published by the autonomy stack.
///
/// Accepted on the wire either as the numeric enum code or as its name
/// (`"GEAR_REVERSE"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "GearRepr")]
pub enum GearPosition {
    #[serde(rename = "GEAR_NEUTRAL")]
    Neutral,
    #[default]
    #[serde(rename = "GEAR_DRIVE")]
    Drive,
    #[serde(rename = "GEAR_REVERSE")]
    Reverse,
    #[serde(rename = "GEAR_PARKING")]
    Parking,
    #[serde(rename = "GEAR_LOW")]
    Low,
    #[serde(rename = "GEAR_INVALID")]
    Invalid,
    #[serde(rename = "GEAR_NONE")]
    None,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GearRepr {
    Code(i64),
    Name(String),
}

impl TryFrom<GearRepr> for GearPosition {
    type Error = String;

    fn try_from(repr: GearRepr) -> Result<Self, Self::Error> {
        match repr {
            GearRepr::Code(code) => GearPosition::from_code(code),
            GearRepr::Name(name) => match name.as_str() {
                "GEAR_NEUTRAL" => Ok(GearPosition::Neutral),
                "GEAR_DRIVE" => Ok(GearPosition::Drive),
                "GEAR_REVERSE" => Ok(GearPosition::Reverse),
                "GEAR_PARKING" => Ok(GearPosition::Parking),
                "GEAR_LOW" => Ok(GearPosition::Low),
                "GEAR_INVALID" => Ok(GearPosition::Invalid),
                "GEAR_NONE" => Ok(GearPosition::None),
                other => Err(format!("unknown gear position '{other}'")),
            },
        }
    }
}

impl GearPosition {
    /// Decode the numeric chassis enum value.
    pub fn from_code(code: i64) -> Result<Self, String> {
        match code {
            0 => Ok(GearPosition::Neutral),
            1 => Ok(GearPosition::Drive),
            2 => Ok(GearPosition::Reverse),
            3 => Ok(GearPosition::Parking),
            4 => Ok(GearPosition::Low),
            5 => Ok(GearPosition::Invalid),
            6 => Ok(GearPosition::None),
            other => Err(format!("unknown gear position code {other}")),
        }
    }
}

/// Control command, all analogue fields normalised to the 0–100 range
/// (`steering_target` to −100..100).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(default)]
    pub throttle: f64,
    #[serde(default)]
    pub brake: f64,
    #[serde(default)]
    pub steering_target: f64,
    #[serde(default)]
    pub parking_brake: bool,
    #[serde(default)]
    pub gear_location: GearPosition,
}

/// A planar pose sample in the planning frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    /// Heading in radians, counter-clockwise from +x.
    #[serde(default)]
    pub theta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub path_point: PathPoint,
    /// Seconds relative to the trajectory header time.
    #[serde(default)]
    pub relative_time: f64,
}

impl TrajectoryPoint {
    pub fn new(x: f64, y: f64, theta: f64, relative_time: f64) -> Self {
        Self {
            path_point: PathPoint { x, y, theta },
            relative_time,
        }
    }
}

/// A full planned trajectory; every message supersedes the previous one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectoryMessage {
    #[serde(default)]
    pub trajectory_point: Vec<TrajectoryPoint>,
}

impl TrajectoryMessage {
    pub fn new(points: Vec<TrajectoryPoint>) -> Self {
        Self {
            trajectory_point: points,
        }
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.trajectory_point
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bus events
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the internal bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "simbridge-middleware::rosbridge/apollo/control"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the internal bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Control(ControlMessage),
    Trajectory(TrajectoryMessage),
    SystemAlert {
        component: String,
        code: u32,
        message: String,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type spanning startup failures, per-message rejections, and actor
/// faults.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Simulator connection failed: {0}")]
    SimConnection(String),

    #[error("Message bus connection failed: {0}")]
    BusConnection(String),

    #[error("No actor matches filter '{filter}'")]
    ActorNotFound { filter: String },

    #[error("Actor {actor_id} is no longer available")]
    ActorGone { actor_id: ActorId },

    #[error("Trajectory has {points} point(s), at least 2 are required")]
    TrajectoryTooShort { points: usize },

    #[error("Nearest point {nearest_index} is the last trajectory point, no look-ahead target")]
    LookAheadOverrun { nearest_index: usize },

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Actuation mode {requested} denied: actor held by '{holder}'")]
    ModeConflict {
        requested: ActuationMode,
        holder: String,
    },

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
