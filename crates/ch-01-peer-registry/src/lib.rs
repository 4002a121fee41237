//! # Peer Registry (ch-01)
//!
//! Detects join/leave of sibling nodes and exposes a stable, ordered peer
//! list plus edge-triggered add/remove callbacks.
//!
//! ## Architecture Role
//!
//! ```text
//!                 cluster.discovery
//! [Node A] ──Join/Heartbeat/Leave──→ ┌─────────────┐
//!                                    │ Message Bus │ ──→ [Node B registry]
//! [Node A] ←──Heartbeat (join fast   └─────────────┘ ──→ [Node C registry]
//!             path reply)
//! ```
//!
//! ## Membership Rules
//!
//! - A peer enters the set the first time its `Join` or `Heartbeat` is
//!   observed; observation order determines its position in `peers()`.
//! - A peer leaves on an explicit `Leave` (fast path) or when no heartbeat
//!   arrives within the liveness window (sweep path).
//! - A `Join` carrying a known name but a fresh connection id is a restart:
//!   the old incarnation is removed, the new one added, both callbacks fire.

pub mod config;
pub mod service;

pub use config::RegistryConfig;
pub use service::{PeerCallback, PeerRegistry};
