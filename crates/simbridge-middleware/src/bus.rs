//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Traffic is partitioned into [`Topic`] lanes so readers only receive the
//! messages they care about:
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Control`] | Control commands from the autonomy stack |
//! | [`Topic::Planning`] | Planned trajectories from the autonomy stack |
//! | [`Topic::SystemAlerts`] | Bridge-level notices (silent topics, lost actors) |

use std::fmt;

use simbridge_types::{BridgeError, Event};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// [`ControlMessage`][simbridge_types::ControlMessage] payloads.
    Control,
    /// [`TrajectoryMessage`][simbridge_types::TrajectoryMessage] payloads.
    Planning,
    /// [`EventPayload::SystemAlert`][simbridge_types::EventPayload::SystemAlert] notices.
    SystemAlerts,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Control => "control",
            Topic::Planning => "planning",
            Topic::SystemAlerts => "system_alerts",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    control: broadcast::Sender<Event>,
    planning: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (control, _) = broadcast::channel(capacity);
        let (planning, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            control,
            planning,
            system_alerts,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Channel`] when nobody is subscribed to `topic`.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, BridgeError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| BridgeError::Channel(format!("No subscribers for topic {topic}")))
    }

    /// Subscribe to a specific [`Topic`] channel.  Events published before
    /// this call are not delivered.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Control => &self.control,
            Topic::Planning => &self.planning,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbridge_types::{ControlMessage, EventPayload};

    fn make_event(source: &str) -> Event {
        Event::new(
            source,
            EventPayload::Control(ControlMessage {
                throttle: 40.0,
                ..ControlMessage::default()
            }),
        )
    }

    #[test]
    fn publish_without_subscribers_returns_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::Control, make_event("test"));
        assert!(matches!(result, Err(BridgeError::Channel(_))));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::Control);
        let mut subscriber2 = bus.subscribe_to(Topic::Control);

        let event = make_event("rosbridge/apollo/control");
        assert_eq!(bus.publish_to(Topic::Control, event.clone())?, 2);

        assert_eq!(subscriber1.recv().await?.id, event.id);
        assert_eq!(subscriber2.recv().await?.id, event.id);
        Ok(())
    }

    /// A subscriber on `Planning` must not receive events published to
    /// `Control` because they are routed through separate channels.
    #[tokio::test]
    async fn subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut planning = bus.subscribe_to(Topic::Planning);
        let _control = bus.subscribe_to(Topic::Control);

        bus.publish_to(Topic::Control, make_event("rosbridge/apollo/control"))?;

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), planning.recv()).await;
        assert!(result.is_err(), "Planning subscriber must not receive a Control event");
        Ok(())
    }

    /// Flooding a low-capacity channel while a subscriber sleeps must produce
    /// a `Lagged` error rather than panicking or blocking.
    #[tokio::test]
    async fn channel_lag_on_slow_subscriber() {
        let bus = EventBus::new(16);
        let mut slow = bus.subscribe_to(Topic::Control);
        for _ in 0..1_000 {
            let _ = bus.publish_to(Topic::Control, make_event("flood"));
        }
        let result = slow.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
        assert_eq!(slow.topic(), Topic::Control);
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(Topic::Planning), 0);
        let rx = bus.subscribe_to(Topic::Planning);
        assert_eq!(bus.subscriber_count(Topic::Planning), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::Planning), 0);
    }
}
