//! # Message Publisher
//!
//! Defines the publishing side of the message bus.

use crate::filter::BusFilter;
use crate::frame::BusFrame;
use crate::subscriber::BusSubscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Trait for publishing frames to the bus.
///
/// This is the only outbound interface cluster components hold; none of
/// them ever talks to another node directly.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a frame to the bus.
    ///
    /// # Returns
    ///
    /// The number of active subscribers the frame was fanned out to.
    async fn publish(&self, frame: BusFrame) -> usize;

    /// Get the total number of frames published.
    fn frames_published(&self) -> u64;
}

/// In-memory implementation of the message bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer
/// semantics. Every node in one process shares a single instance; a
/// deployment spanning processes would bridge the same frames over an
/// external broker instead.
pub struct InMemoryMessageBus {
    /// Broadcast sender for frames.
    sender: broadcast::Sender<BusFrame>,

    /// Active subscription count by filter key.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total frames published.
    frames_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            frames_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to frames matching a filter.
    ///
    /// Returns a `BusSubscription` handle that can be used to receive frames.
    #[must_use]
    pub fn subscribe(&self, filter: BusFilter) -> BusSubscription {
        let receiver = self.sender.subscribe();
        let filter_key = filter.key();

        // Track subscription
        {
            if let Ok(mut subs) = self.subscriptions.write() {
                *subs.entry(filter_key.clone()).or_insert(0) += 1;
            }
        }

        debug!(filter = %filter_key, "New subscription created");

        BusSubscription::new(receiver, filter, self.subscriptions.clone(), filter_key)
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::subscriber::MessageSubscriber for InMemoryMessageBus {
    fn subscribe(&self, filter: BusFilter) -> BusSubscription {
        Self::subscribe(self, filter)
    }
}

#[async_trait]
impl MessagePublisher for InMemoryMessageBus {
    async fn publish(&self, frame: BusFrame) -> usize {
        // Always increment counter (publish was attempted)
        self.frames_published.fetch_add(1, Ordering::Relaxed);

        let topic = frame.topic.clone();
        match self.sender.send(frame) {
            Ok(receiver_count) => {
                trace!(
                    topic = %topic,
                    receivers = receiver_count,
                    "Frame published"
                );
                receiver_count
            }
            Err(_) => {
                // No receivers anywhere - the frame is dropped. Normal for
                // the first node of a cluster before its pumps attach.
                debug!(topic = %topic, "Frame dropped (no receivers)");
                0
            }
        }
    }

    fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }
}
