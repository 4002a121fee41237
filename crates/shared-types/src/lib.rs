//! # Shared Types Crate
//!
//! All cross-subsystem types for the Chorus cluster: identity value objects,
//! the `ClusterMessage` envelope every bus frame is wrapped in, bus topic
//! naming, and the `TimeSource` port.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a subsystem boundary
//!   is defined here.
//! - **Envelope Integrity**: `ClusterMessage` is the sole wrapper for bus
//!   traffic; its `origin` field is the authoritative sender identity, so
//!   payloads never carry a redundant sender field.
//! - **Injectable time**: all liveness bookkeeping goes through the
//!   [`TimeSource`] port so expiry logic is testable with a manual clock.

pub mod entities;
pub mod envelope;
pub mod subscription;
pub mod time;
pub mod topics;

pub use entities::{DeviceId, PeerAddress, PresenceEntry, ServerName};
pub use envelope::{ClusterMessage, MessageBody, StateSyncPayload, PROTOCOL_VERSION};
pub use subscription::{CallbackSet, SubscriptionId};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource, Timestamp};
