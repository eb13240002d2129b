// ── Toggle signal transport ──
//
// The transport is external: it delivers payloads on one topic, serially,
// at least once, and replays the retained value to every new subscriber.
// This module only fixes the payload shape, the decoding rule, and the
// readiness gate that delays subscription until the host is up.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::debug;

use crate::error::CoreError;

const CHANNEL_SIZE: usize = 32;

/// A raw toggle payload as the transport delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
    /// The transport delivered an empty or null message.
    Missing,
}

impl Payload {
    /// The payload as UTF-8 text; `None` for `Missing` and invalid bytes.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(s) => Some(Cow::Borrowed(s)),
            Self::Bytes(b) => std::str::from_utf8(b).ok().map(Cow::Borrowed),
            Self::Missing => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&[u8]> for Payload {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

/// `true` iff the trimmed payload text is exactly `"true"`.
pub fn decode_toggle(payload: &Payload) -> bool {
    payload.as_text().is_some_and(|text| text.trim() == "true")
}

/// Pub/sub transport delivering toggle payloads.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Subscribe to `topic`. Deliveries arrive on the returned channel in
    /// order; the channel closes when the transport goes away.
    async fn subscribe(&self, topic: &str, qos: u8) -> Result<mpsc::Receiver<Payload>, CoreError>;
}

// ── In-memory transport ──────────────────────────────────────────────

/// In-process transport backed by a bounded channel.
///
/// Payloads published before anyone subscribes are buffered and delivered
/// first, which is how a retained message looks to a late subscriber.
pub struct ChannelSignalSource {
    rx: Mutex<Option<mpsc::Receiver<Payload>>>,
    subscriptions: AtomicUsize,
}

/// Sending side of a [`ChannelSignalSource`].
#[derive(Debug, Clone)]
pub struct SignalPublisher {
    tx: mpsc::Sender<Payload>,
}

impl ChannelSignalSource {
    pub fn new() -> (Self, SignalPublisher) {
        let (tx, rx) = mpsc::channel(CHANNEL_SIZE);
        let source = Self {
            rx: Mutex::new(Some(rx)),
            subscriptions: AtomicUsize::new(0),
        };
        (source, SignalPublisher { tx })
    }

    /// Number of successful `subscribe` calls so far.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSource for ChannelSignalSource {
    async fn subscribe(&self, topic: &str, qos: u8) -> Result<mpsc::Receiver<Payload>, CoreError> {
        let rx = self
            .rx
            .lock()
            .await
            .take()
            .ok_or_else(|| CoreError::Subscription {
                topic: topic.to_owned(),
                message: "channel already has a subscriber".into(),
            })?;
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        debug!(topic, qos, "subscribed to in-memory signal channel");
        Ok(rx)
    }
}

impl SignalPublisher {
    /// Deliver a payload. Fails once the subscriber has gone away.
    pub async fn publish(&self, payload: impl Into<Payload>) -> Result<(), CoreError> {
        self.tx
            .send(payload.into())
            .await
            .map_err(|_| CoreError::ControllerUnavailable)
    }
}

// ── Readiness gate ───────────────────────────────────────────────────

/// Host "fully started" event.
///
/// Firing is idempotent: once ready, the gate stays open and firing again
/// changes nothing for anyone already past [`wait`](Self::wait).
#[derive(Debug, Clone)]
pub struct Readiness {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Open the gate.
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the gate has been opened (immediately if it already is).
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}
