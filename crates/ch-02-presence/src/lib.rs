//! # Presence Directory (ch-02)
//!
//! Cluster-wide visibility of connected client identities.
//!
//! Each node is authoritative only for the clients connected directly to it;
//! the directory every node answers `get_all()` from is the merged union of
//! all login/logout traffic observed on `cluster.presence`. Entries whose
//! origin node vanishes are synthesized into logouts by the peer-removal
//! cascade, so no ghost clients survive an ungraceful node loss.

pub mod service;

pub use service::{PresenceCallback, PresenceDirectory};
