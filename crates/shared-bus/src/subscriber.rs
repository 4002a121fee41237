//! # Message Subscriber
//!
//! Defines the subscription side of the message bus.

use crate::filter::BusFilter;
use crate::frame::BusFrame;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The message bus was closed.
    #[error("Message bus closed")]
    Closed,
}

/// Trait for subscribing to frames from the bus.
#[async_trait]
pub trait MessageSubscriber: Send + Sync {
    /// Subscribe to frames matching a filter.
    fn subscribe(&self, filter: BusFilter) -> BusSubscription;
}

/// A subscription handle for receiving frames.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct BusSubscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<BusFrame>,

    /// Filter for this subscription.
    filter: BusFilter,

    /// Reference to subscription tracking (for cleanup).
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Filter key for this subscription.
    filter_key: String,
}

impl BusSubscription {
    /// Create a new subscription.
    pub(crate) fn new(
        receiver: broadcast::Receiver<BusFrame>,
        filter: BusFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        filter_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            subscriptions,
            filter_key,
        }
    }

    /// Receive the next frame that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(frame)` - The next matching frame
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<BusFrame> {
        loop {
            let frame = match self.receiver.recv().await {
                Ok(frame) => frame,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some frames dropped");
                    continue;
                }
            };

            if self.filter.matches(&frame.topic) {
                return Some(frame);
            }
            // Frame doesn't match filter, continue waiting
        }
    }

    /// Try to receive the next frame without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(frame))` - A frame was available and matched
    /// - `Ok(None)` - No frame available (would block)
    /// - `Err(BusError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<BusFrame>, BusError> {
        loop {
            let frame = match self.receiver.try_recv() {
                Ok(frame) => frame,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(BusError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&frame.topic) {
                return Ok(Some(frame));
            }
            // Frame doesn't match filter, try again
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &BusFilter {
        &self.filter
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        // Decrement subscription count
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.filter_key) else {
            debug!(filter = %self.filter_key, "Subscription dropped");
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.filter_key);
        }
        debug!(filter = %self.filter_key, "Subscription dropped");
    }
}
