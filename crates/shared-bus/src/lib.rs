//! # Shared Bus - Message Bus for Inter-Node Communication
//!
//! The ONLY channel cluster nodes use to coordinate. There are no direct
//! node-to-node connections anywhere in the system.
//!
//! ## Choreography
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │   Node A     │                    │   Node B     │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │ Message Bus  │ ─────────┘
//!                  │              │  subscribe()
//!                  └──────────────┘
//! ```
//!
//! ## Delivery Model
//!
//! - **Fan-out**: every frame reaches every subscriber whose filter matches
//!   its topic; publishers never learn who received what.
//! - **Local echo**: a node's own frames come back through its subscriptions
//!   and are dropped by origin there, so handlers see remote traffic only.
//! - **Best-effort**: a slow subscriber that overruns its buffer loses the
//!   oldest frames and keeps going; nothing blocks the publisher.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

use std::sync::Arc;

pub mod filter;
pub mod frame;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use filter::{BusFilter, TopicPattern};
pub use frame::BusFrame;
pub use publisher::{InMemoryMessageBus, MessagePublisher};
pub use subscriber::{BusError, BusSubscription, MessageSubscriber};

/// Both halves of the bus, as shared by a node process (`Arc<dyn MessageBus>`).
pub trait MessageBus: MessagePublisher + MessageSubscriber {
    /// Narrow a shared handle to its publishing half.
    ///
    /// Components hold `Arc<dyn MessagePublisher>`, which a plain cast
    /// cannot produce from `Arc<dyn MessageBus>`.
    fn as_publisher(self: Arc<Self>) -> Arc<dyn MessagePublisher>;
}

impl<T: MessagePublisher + MessageSubscriber + 'static> MessageBus for T {
    fn as_publisher(self: Arc<Self>) -> Arc<dyn MessagePublisher> {
        self
    }
}

/// Maximum frames to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
