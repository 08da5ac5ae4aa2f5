//! [`MessageVerifier`] – per-message shape checks.
//!
//! Every inbound message is passed through [`MessageVerifier::verify`] before
//! it can actuate anything.  Registered [`Rule`]s are evaluated in order; the
//! first violation returns an error and the message is skipped.  A rejected
//! message never ends the subscription.
//!
//! Built-in rules:
//! - [`TrajectoryLengthRule`] – trajectories need at least `min_points`.
//! - [`FiniteTrajectoryRule`] – no NaN or infinite coordinates.
//! - [`FiniteControlRule`] – no NaN or infinite control fields.  Finite but
//!   out-of-range values are clamped later by the shaper.

use simbridge_types::{BridgeError, ControlMessage, TrajectoryMessage};

/// A message under verification.
#[derive(Debug, Clone, Copy)]
pub enum BridgeMessage<'a> {
    Control(&'a ControlMessage),
    Trajectory(&'a TrajectoryMessage),
}

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single shape invariant a message must satisfy.
pub trait Rule: Send + Sync {
    /// Human-readable name used in rejection messages.
    fn name(&self) -> &str;

    fn check(&self, message: BridgeMessage<'_>) -> Result<(), BridgeError>;
}

// ────────────────────────────────────────────────────────────────────────────
// MessageVerifier
// ────────────────────────────────────────────────────────────────────────────

/// Ordered rule engine.
///
/// # Example
///
/// ```
/// use simbridge_kernel::message_verifier::{BridgeMessage, MessageVerifier};
/// use simbridge_types::{TrajectoryMessage, TrajectoryPoint};
///
/// let verifier = MessageVerifier::with_default_rules();
///
/// let short = TrajectoryMessage::new(vec![TrajectoryPoint::new(0.0, 0.0, 0.0, 0.0)]);
/// assert!(verifier.verify(BridgeMessage::Trajectory(&short)).is_err());
/// ```
#[derive(Default)]
pub struct MessageVerifier {
    rules: Vec<Box<dyn Rule>>,
}

impl MessageVerifier {
    /// Create an empty verifier with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier carrying every built-in rule, trajectories needing two points.
    pub fn with_default_rules() -> Self {
        let mut verifier = Self::new();
        verifier.add_rule(Box::new(TrajectoryLengthRule { min_points: 2 }));
        verifier.add_rule(Box::new(FiniteTrajectoryRule));
        verifier.add_rule(Box::new(FiniteControlRule));
        verifier
    }

    /// Register a new [`Rule`].  Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Validate `message` against every registered rule.
    pub fn verify(&self, message: BridgeMessage<'_>) -> Result<(), BridgeError> {
        for rule in &self.rules {
            rule.check(message)?;
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Rejects trajectories shorter than `min_points`.
pub struct TrajectoryLengthRule {
    pub min_points: usize,
}

impl Rule for TrajectoryLengthRule {
    fn name(&self) -> &str {
        "trajectory_length"
    }

    fn check(&self, message: BridgeMessage<'_>) -> Result<(), BridgeError> {
        if let BridgeMessage::Trajectory(trajectory) = message {
            let points = trajectory.points().len();
            if points < self.min_points {
                return Err(BridgeError::TrajectoryTooShort { points });
            }
        }
        Ok(())
    }
}

/// Rejects trajectories containing a non-finite coordinate.
pub struct FiniteTrajectoryRule;

impl Rule for FiniteTrajectoryRule {
    fn name(&self) -> &str {
        "finite_trajectory"
    }

    fn check(&self, message: BridgeMessage<'_>) -> Result<(), BridgeError> {
        let BridgeMessage::Trajectory(trajectory) = message else {
            return Ok(());
        };
        let bad = trajectory.points().iter().position(|p| {
            ![p.path_point.x, p.path_point.y, p.path_point.theta]
                .iter()
                .all(|v| v.is_finite())
        });
        match bad {
            Some(index) => Err(BridgeError::MalformedMessage(format!(
                "{}: trajectory point {index} has a non-finite coordinate",
                self.name()
            ))),
            None => Ok(()),
        }
    }
}

/// Rejects control commands containing a non-finite analogue field.
pub struct FiniteControlRule;

impl Rule for FiniteControlRule {
    fn name(&self) -> &str {
        "finite_control"
    }

    fn check(&self, message: BridgeMessage<'_>) -> Result<(), BridgeError> {
        let BridgeMessage::Control(control) = message else {
            return Ok(());
        };
        for (field, value) in [
            ("throttle", control.throttle),
            ("brake", control.brake),
            ("steering_target", control.steering_target),
        ] {
            if !value.is_finite() {
                return Err(BridgeError::MalformedMessage(format!(
                    "{}: {field} is {value}",
                    self.name()
                )));
            }
        }
        Ok(())
    }
}
