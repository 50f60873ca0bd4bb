//! # Subject Bus
//!
//! In-process publish/subscribe keyed by subject string.
//!
//! Each subject gets its own `tokio::sync::broadcast` channel, created on
//! first use. Publishing never blocks; a subscriber that falls more than
//! `capacity` messages behind skips ahead and is told how many it missed.
//! A message published while nobody listens is dropped.

use edg_core::{EdgError, Forwarder};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

/// One message as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub subject: Arc<str>,
    pub payload: Arc<[u8]>,
}

/// Broadcast channels per subject.
#[derive(Debug)]
pub struct SubjectBus {
    channels: RwLock<HashMap<String, broadcast::Sender<BusMessage>>>,
    capacity: usize,
    published: AtomicU64,
}

impl SubjectBus {
    /// `capacity` must be non-zero; the gateway config rejects zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            published: AtomicU64::new(0),
        }
    }

    /// Subscribe to every message published on `subject` from now on.
    pub fn subscribe(&self, subject: &str) -> broadcast::Receiver<BusMessage> {
        let receiver = self.sender(subject).subscribe();
        debug!(subject = %subject, "bus subscription created");
        receiver
    }

    /// Publish `payload` unchanged. Returns how many subscribers received it.
    pub fn send(&self, subject: &str, payload: &[u8]) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let message = BusMessage {
            subject: Arc::from(subject),
            payload: Arc::from(payload),
        };
        match self.sender(subject).send(message) {
            Ok(receivers) => {
                debug!(subject = %subject, receivers, "message published");
                receivers
            }
            Err(_) => {
                debug!(subject = %subject, "message dropped (no subscribers)");
                0
            }
        }
    }

    /// Messages published since startup, delivered or not.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn sender(&self, subject: &str) -> broadcast::Sender<BusMessage> {
        if let Some(sender) = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
        {
            return sender.clone();
        }
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Forwarder for SubjectBus {
    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), EdgError> {
        self.send(subject, payload);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
