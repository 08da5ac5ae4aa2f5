//! [`Watchdog`] – per-topic silence monitor.
//!
//! Every subscribed topic is registered with a timeout.  The node calls
//! [`Watchdog::heartbeat`] for each message received; a supervisor loop calls
//! [`Watchdog::check_transitions`] to learn which topics fell silent or came
//! back since the previous check.  Each silent episode is reported once.
//!
//! Silence is informational only: the vehicle keeps its last command and the
//! subscription is never torn down.

use std::collections::HashMap;
use std::time::{Duration, Instant};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Health state reported for a single topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicHealth {
    /// A message arrived within the timeout.
    Healthy,
    /// Nothing arrived within the timeout.
    Silent,
}

/// A health change observed by [`Watchdog::check_transitions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicTransition {
    WentSilent(String),
    Recovered(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Internal entry
// ────────────────────────────────────────────────────────────────────────────

struct TopicEntry {
    last_message: Instant,
    timeout: Duration,
    reported_silent: bool,
}

impl TopicEntry {
    fn is_silent(&self) -> bool {
        self.last_message.elapsed() > self.timeout
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Watchdog
// ────────────────────────────────────────────────────────────────────────────

/// Tracks message arrival per topic.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use simbridge_kernel::watchdog::{TopicHealth, Watchdog};
///
/// let mut wd = Watchdog::new();
/// wd.register("/apollo/control", Duration::from_secs(2));
/// wd.heartbeat("/apollo/control");
///
/// assert_eq!(wd.health("/apollo/control"), TopicHealth::Healthy);
/// assert!(wd.check_transitions().is_empty());
/// ```
#[derive(Default)]
pub struct Watchdog {
    topics: HashMap<String, TopicEntry>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `topic` with a silence `timeout`.  The clock starts now, so a
    /// topic that never publishes is reported after one timeout.
    ///
    /// Re-registering resets the deadline and the reported state.
    pub fn register(&mut self, topic: &str, timeout: Duration) {
        self.topics.insert(
            topic.to_string(),
            TopicEntry {
                last_message: Instant::now(),
                timeout,
                reported_silent: false,
            },
        );
    }

    /// Record a message on `topic`.  No-ops for unregistered topics.
    pub fn heartbeat(&mut self, topic: &str) {
        if let Some(entry) = self.topics.get_mut(topic) {
            entry.last_message = Instant::now();
        }
    }

    /// [`TopicHealth::Silent`] for unknown topics.
    pub fn health(&self, topic: &str) -> TopicHealth {
        match self.topics.get(topic) {
            Some(entry) if !entry.is_silent() => TopicHealth::Healthy,
            _ => TopicHealth::Silent,
        }
    }

    /// Topics whose state changed since the previous call, sorted by name.
    pub fn check_transitions(&mut self) -> Vec<TopicTransition> {
        let mut transitions: Vec<TopicTransition> = self
            .topics
            .iter_mut()
            .filter_map(|(topic, entry)| match (entry.is_silent(), entry.reported_silent) {
                (true, false) => {
                    entry.reported_silent = true;
                    Some(TopicTransition::WentSilent(topic.clone()))
                }
                (false, true) => {
                    entry.reported_silent = false;
                    Some(TopicTransition::Recovered(topic.clone()))
                }
                _ => None,
            })
            .collect();
        transitions.sort_by(|a, b| topic_of(a).cmp(topic_of(b)));
        transitions
    }
}

fn topic_of(transition: &TopicTransition) -> &str {
    match transition {
        TopicTransition::WentSilent(topic) | TopicTransition::Recovered(topic) => topic,
    }
}
