//! rosbridge-protocol ingest.
//!
//! [`RosbridgeClient`] connects to the autonomy stack's rosbridge WebSocket,
//! subscribes to each routed topic and turns every `publish` frame into an
//! [`Event`] on the internal [`EventBus`]:
//!
//! ```json
//! {"op":"publish","topic":"/apollo/control","msg":{"throttle":50.0, ...}}
//! ```
//!
//! Frames for unrouted topics and non-`publish` ops are ignored.  A frame
//! whose `msg` does not decode is logged at `warn` and dropped; the
//! connection keeps running.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use simbridge_types::{BridgeError, ControlMessage, Event, EventPayload, TrajectoryMessage};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic};

#[derive(Debug, Deserialize)]
struct Frame {
    op: String,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    msg: serde_json::Value,
}

/// Maps external rosbridge topics onto bus lanes and feeds the bus.
#[derive(Clone)]
pub struct RosbridgeClient {
    bus: EventBus,
    routes: Vec<(String, Topic)>,
}

impl RosbridgeClient {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            routes: Vec::new(),
        }
    }

    /// Forward the external topic `name` onto `lane`.
    pub fn route(mut self, name: impl Into<String>, lane: Topic) -> Self {
        self.routes.push((name.into(), lane));
        self
    }

    /// The `subscribe` frames sent right after connecting, one per route.
    pub fn subscribe_frames(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|(name, _)| json!({ "op": "subscribe", "topic": name }).to_string())
            .collect()
    }

    /// Decode one text frame.
    ///
    /// Returns `Ok(None)` for frames that are not a `publish` on a routed
    /// topic.
    ///
    /// # Errors
    ///
    /// [`BridgeError::MalformedMessage`] when the frame is not JSON or its
    /// `msg` does not match the lane's schema.
    pub fn decode(&self, text: &str) -> Result<Option<(Topic, Event)>, BridgeError> {
        let frame: Frame = serde_json::from_str(text)
            .map_err(|e| BridgeError::MalformedMessage(format!("invalid rosbridge frame: {e}")))?;
        if frame.op != "publish" {
            return Ok(None);
        }
        let Some(lane) = self.lane_for(&frame.topic) else {
            return Ok(None);
        };

        let payload = match lane {
            Topic::Control => serde_json::from_value::<ControlMessage>(frame.msg)
                .map(EventPayload::Control),
            Topic::Planning => serde_json::from_value::<TrajectoryMessage>(frame.msg)
                .map(EventPayload::Trajectory),
            Topic::SystemAlerts => {
                return Err(BridgeError::MalformedMessage(format!(
                    "{} is not an ingest topic",
                    frame.topic
                )));
            }
        }
        .map_err(|e| BridgeError::MalformedMessage(format!("{}: {e}", frame.topic)))?;

        let source = format!("simbridge-middleware::rosbridge{}", frame.topic);
        Ok(Some((lane, Event::new(source, payload))))
    }

    /// Decode `text` and publish it onto the bus.  Never fails: bad frames
    /// are logged and dropped.
    pub fn ingest(&self, text: &str) {
        match self.decode(text) {
            Ok(Some((lane, event))) => {
                if let Err(e) = self.bus.publish_to(lane, event) {
                    debug!(topic = %lane, error = %e, "no reader for ingested message");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "dropping rosbridge frame"),
        }
    }

    /// Connect to `url`, subscribe to every route and spawn the ingest task.
    ///
    /// Aborting the returned handle drops the connection.
    ///
    /// # Errors
    ///
    /// [`BridgeError::BusConnection`] when the endpoint is unreachable, the
    /// handshake exceeds `timeout`, or a subscribe frame cannot be sent.
    pub async fn connect(&self, url: &str, timeout: Duration) -> Result<JoinHandle<()>, BridgeError> {
        let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| BridgeError::BusConnection(format!("timed out connecting to {url}")))?
            .map_err(|e| BridgeError::BusConnection(format!("{url}: {e}")))?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        for frame in self.subscribe_frames() {
            ws_tx
                .send(Message::Text(frame.into()))
                .await
                .map_err(|e| BridgeError::BusConnection(format!("subscribe failed: {e}")))?;
        }
        info!(url, topics = self.routes.len(), "subscribed to rosbridge topics");

        let client = self.clone();
        Ok(tokio::spawn(async move {
            // Keep the sink alive for the lifetime of the connection.
            let _ws_tx = ws_tx;
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => client.ingest(text.as_str()),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "rosbridge read error");
                        break;
                    }
                }
            }
            warn!("rosbridge connection closed");
        }))
    }

    fn lane_for(&self, topic: &str) -> Option<Topic> {
        self.routes
            .iter()
            .find(|(name, _)| name == topic)
            .map(|(_, lane)| *lane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbridge_types::GearPosition;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn client() -> RosbridgeClient {
        RosbridgeClient::new(EventBus::default())
            .route("/apollo/control", Topic::Control)
            .route("/apollo/planning", Topic::Planning)
    }

    #[test]
    fn subscribe_frames_cover_every_route() {
        let frames = client().subscribe_frames();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains(r#""op":"subscribe""#));
        assert!(frames[1].contains("/apollo/planning"));
    }

    #[test]
    fn control_frame_decodes_with_gear_name() {
        let raw = r#"{"op":"publish","topic":"/apollo/control","msg":{"throttle":50.0,"brake":20.0,"steering_target":30.0,"gear_location":"GEAR_REVERSE"}}"#;
        let (lane, event) = client().decode(raw).unwrap().unwrap();
        assert_eq!(lane, Topic::Control);
        assert_eq!(event.source, "simbridge-middleware::rosbridge/apollo/control");
        match event.payload {
            EventPayload::Control(c) => {
                assert_eq!(c.throttle, 50.0);
                assert_eq!(c.gear_location, GearPosition::Reverse);
                assert!(!c.parking_brake);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn trajectory_frame_decodes_with_defaults() {
        let raw = r#"{"op":"publish","topic":"/apollo/planning","msg":{"trajectory_point":[{"path_point":{"x":1.0,"y":2.0,"theta":0.5}}]}}"#;
        let (lane, event) = client().decode(raw).unwrap().unwrap();
        assert_eq!(lane, Topic::Planning);
        match event.payload {
            EventPayload::Trajectory(t) => {
                assert_eq!(t.points().len(), 1);
                assert_eq!(t.points()[0].relative_time, 0.0);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn unrouted_topics_and_other_ops_are_ignored() {
        let c = client();
        assert!(c
            .decode(r#"{"op":"publish","topic":"/apollo/localization","msg":{}}"#)
            .unwrap()
            .is_none());
        assert!(c
            .decode(r#"{"op":"status","level":"info"}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn malformed_frames_are_errors() {
        let c = client();
        assert!(matches!(
            c.decode("not json"),
            Err(BridgeError::MalformedMessage(_))
        ));
        assert!(matches!(
            c.decode(r#"{"op":"publish","topic":"/apollo/control","msg":{"gear_location":42}}"#),
            Err(BridgeError::MalformedMessage(msg)) if msg.starts_with("/apollo/control")
        ));
    }

    #[tokio::test]
    async fn ingest_publishes_onto_the_lane() {
        let bus = EventBus::default();
        let client = RosbridgeClient::new(bus.clone()).route("/apollo/control", Topic::Control);
        let mut rx = bus.subscribe_to(Topic::Control);

        client.ingest(r#"{"op":"publish","topic":"/apollo/control","msg":{"brake":5.0}}"#);
        client.ingest("garbage");

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.payload, EventPayload::Control(c) if c.brake == 5.0));
    }

    #[tokio::test]
    async fn connect_subscribes_and_forwards_publishes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let subscribe = ws.next().await.unwrap().unwrap();
            ws.send(Message::Text(
                r#"{"op":"publish","topic":"/apollo/control","msg":{"throttle":12.0}}"#
                    .to_string()
                    .into(),
            ))
            .await
            .unwrap();
            // Hold the socket open until the client has read the frame.
            let _ = ws.next().await;
            subscribe.into_text().unwrap().to_string()
        });

        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Control);
        let client = RosbridgeClient::new(bus).route("/apollo/control", Topic::Control);
        let handle = client
            .connect(&format!("ws://127.0.0.1:{port}"), Duration::from_secs(5))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.payload, EventPayload::Control(c) if c.throttle == 12.0));

        handle.abort();
        let subscribe = server.await.unwrap();
        assert!(subscribe.contains("/apollo/control"));
    }

    #[tokio::test]
    async fn connect_reports_unreachable_bus() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = client()
            .connect(&format!("ws://127.0.0.1:{port}"), Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(BridgeError::BusConnection(_))));
    }
}
