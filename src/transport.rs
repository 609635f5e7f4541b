// Outbound side of the bus, injected into the coordinator
// Publishes are fire-and-forget: nothing waits for a reply or an acknowledgement.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Publisher closed, dropped message for {topic}")]
    Closed { topic: String },

    #[error("Failed to encode message for {topic}: {source}")]
    Encode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}

pub trait Transport: Send + Sync {
    /// Queue `payload` for `topic`. Must not block.
    fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError>;

    /// False while recent publishes are failing downstream
    fn is_link_up(&self) -> bool {
        true
    }
}

/// Serialize `msg` to JSON and publish it
pub fn publish_json<T: Serialize + ?Sized>(
    transport: &dyn Transport,
    topic: &str,
    msg: &T,
) -> Result<(), TransportError> {
    let payload = serde_json::to_string(msg).map_err(|source| TransportError::Encode {
        topic: topic.to_string(),
        source,
    })?;
    transport.publish(topic, payload)
}

/// Link edge seen by [`LinkMonitor::record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    Lost,
    Restored,
}

/// Shared up/down flag driven by publish outcomes. Starts up.
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    up: Arc<AtomicBool>,
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self {
            up: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Relaxed)
    }

    /// Record one publish outcome; returns the edge if the link flipped
    pub fn record(&self, ok: bool) -> Option<LinkChange> {
        let was_up = self.up.swap(ok, Ordering::Relaxed);
        match (was_up, ok) {
            (true, false) => Some(LinkChange::Lost),
            (false, true) => Some(LinkChange::Restored),
            _ => None,
        }
    }
}

/// Drain queued publishes through `put` in order, tracking the link on `monitor`.
/// Failures are logged once per outage and never stop the loop.
pub async fn forward_publishes<P, Fut, E>(
    mut rx: mpsc::UnboundedReceiver<(String, String)>,
    monitor: LinkMonitor,
    mut put: P,
) where
    P: FnMut(String, String) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    while let Some((topic, payload)) = rx.recv().await {
        let result = put(topic.clone(), payload).await;
        match (monitor.record(result.is_ok()), result) {
            (Some(LinkChange::Lost), Err(e)) => {
                warn!("Transport unavailable, publishing to {} failed: {}", topic, e);
            }
            (Some(LinkChange::Restored), _) => info!("Transport restored"),
            (None, Err(e)) => debug!("Publish to {} failed: {}", topic, e),
            _ => {}
        }
    }
    debug!("Publisher task finished");
}

/// Zenoh-backed transport. Publishes are queued and a background task puts
/// them on the session in order.
pub struct ZenohTransport {
    tx: mpsc::UnboundedSender<(String, String)>,
    link: LinkMonitor,
}

impl ZenohTransport {
    /// Must be called from within a tokio runtime
    pub fn new(session: zenoh::Session) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<(String, String)>();
        let link = LinkMonitor::new();

        tokio::spawn(forward_publishes(rx, link.clone(), move |topic, payload| {
            let session = session.clone();
            async move { session.put(topic.as_str(), payload).await }
        }));

        Self { tx, link }
    }
}

impl Transport for ZenohTransport {
    fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        self.tx
            .send((topic.to_string(), payload))
            .map_err(|_| TransportError::Closed {
                topic: topic.to_string(),
            })
    }

    fn is_link_up(&self) -> bool {
        self.link.is_up()
    }
}

/// Logs publishes instead of sending them (dry-run)
pub struct LogTransport;

impl Transport for LogTransport {
    fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        info!("[dry-run] {} <- {}", topic, payload);
        Ok(())
    }
}

/// In-memory bus that records every publish
#[derive(Default, Clone)]
pub struct RecordingTransport {
    published: Arc<Mutex<Vec<(String, String)>>>,
    link: LinkMonitor,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages so far as (topic, payload)
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Payloads published on `topic`, decoded as JSON
    pub fn on_topic(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, p)| serde_json::from_str(&p).ok())
            .collect()
    }

    pub fn count(&self, topic: &str) -> usize {
        self.published().iter().filter(|(t, _)| t == topic).count()
    }

    pub fn clear(&self) {
        if let Ok(mut p) = self.published.lock() {
            p.clear();
        }
    }

    /// Simulate the downstream link going down or coming back
    pub fn set_link_up(&self, up: bool) {
        self.link.record(up);
    }
}

impl Transport for RecordingTransport {
    fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        if let Ok(mut p) = self.published.lock() {
            p.push((topic.to_string(), payload));
        }
        Ok(())
    }

    fn is_link_up(&self) -> bool {
        self.link.is_up()
    }
}
