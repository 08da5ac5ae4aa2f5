//! [`Node`] – reader registration and callback dispatch.
//!
//! A node owns one [`Reader`] per registered handler.  Each reader is
//! subscribed to its bus lane at registration time, so nothing published
//! after [`Node::create_reader`] returns is lost.  [`Node::spin`] drives all
//! readers until the shutdown future resolves:
//!
//! * messages on one reader are handled strictly in arrival order;
//! * handlers run synchronously, so on a current-thread runtime no two
//!   callbacks ever overlap;
//! * a handler error skips that message only (see
//!   [`report_rejection`][crate::adapter::report_rejection]).

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use simbridge_kernel::Watchdog;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::adapter::{MessageHandler, report_rejection};
use crate::bus::{EventBus, Topic, TopicReceiver};

/// Watchdog shared between the node's readers and a supervisor loop.
pub type SharedWatchdog = Arc<Mutex<Watchdog>>;

/// One subscription plus its handler.
pub struct Reader {
    receiver: TopicReceiver,
    handler: Box<dyn MessageHandler>,
    watchdog: Option<SharedWatchdog>,
}

impl Reader {
    pub fn topic(&self) -> Topic {
        self.receiver.topic()
    }

    async fn run(mut self) {
        let topic = self.topic();
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if let Some(watchdog) = &self.watchdog {
                        watchdog
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .heartbeat(topic.as_str());
                    }
                    if let Err(e) = self.handler.handle(&event.payload) {
                        report_rejection(self.handler.name(), &e);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(%topic, handler = self.handler.name(), lagged_by = n, "reader lagged, messages dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// A named set of readers sharing one bus.
pub struct Node {
    name: String,
    bus: EventBus,
    readers: Vec<Reader>,
    watchdog: Option<(SharedWatchdog, Duration)>,
}

impl Node {
    pub fn new(name: impl Into<String>, bus: EventBus) -> Self {
        Self {
            name: name.into(),
            bus,
            readers: Vec::new(),
            watchdog: None,
        }
    }

    /// Heartbeat `watchdog` on every message; readers created afterwards
    /// are registered with `timeout`.
    pub fn with_watchdog(mut self, watchdog: SharedWatchdog, timeout: Duration) -> Self {
        self.watchdog = Some((watchdog, timeout));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe `handler` to `topic`.
    pub fn create_reader(&mut self, topic: Topic, handler: Box<dyn MessageHandler>) {
        let watchdog = self.watchdog.as_ref().map(|(watchdog, timeout)| {
            watchdog
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .register(topic.as_str(), *timeout);
            Arc::clone(watchdog)
        });
        info!(node = %self.name, %topic, handler = handler.name(), "reader created");
        self.readers.push(Reader {
            receiver: self.bus.subscribe_to(topic),
            handler,
            watchdog,
        });
    }

    pub fn readers(&self) -> &[Reader] {
        &self.readers
    }

    /// Dispatch messages until `shutdown` resolves or every reader's
    /// channel closes.
    pub async fn spin<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Node { name, readers, .. } = self;
        let mut tasks = JoinSet::new();
        for reader in readers {
            tasks.spawn(reader.run());
        }
        info!(node = %name, readers = tasks.len(), "node spinning");

        let drain = async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    error!(node = %name, error = %e, "reader task failed");
                }
            }
        };

        tokio::select! {
            _ = shutdown => info!(node = %name, "shutdown requested"),
            _ = drain => warn!(node = %name, "all readers closed"),
        }
        tasks.shutdown().await;
    }
}
