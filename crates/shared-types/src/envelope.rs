//! # `ClusterMessage` Envelope
//!
//! The universal wrapper for ALL bus traffic between cluster nodes.
//!
//! ## Properties
//!
//! - **Versioning**: every message carries a protocol `version`; receivers
//!   drop unknown versions before touching the body.
//! - **Origin authority**: the envelope `origin` is the sole source of truth
//!   for the sending node's identity. Bodies never duplicate it, with one
//!   deliberate exception: `RecordUpdate::author` names the node that *wrote*
//!   the version, which differs from `origin` when a holder republishes
//!   another node's write in answer to a read request.
//! - **Correlation**: RPC request/response pairs share a `correlation_id`;
//!   the response travels to the private inbox of the request's origin.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{DeviceId, PeerAddress, PresenceEntry, ServerName};

/// Current protocol version for cluster messages.
///
/// Receivers MUST check this before processing and drop mismatches.
pub const PROTOCOL_VERSION: u16 = 1;

/// The envelope wrapping every message a node publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMessage {
    /// Protocol version for forward compatibility.
    pub version: u16,
    /// The node that published this frame.
    pub origin: ServerName,
    /// The actual message payload.
    pub body: MessageBody,
}

impl ClusterMessage {
    /// Wrap a body in an envelope at the current protocol version.
    #[must_use]
    pub fn new(origin: ServerName, body: MessageBody) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            origin,
            body,
        }
    }

    /// Whether this node understands the message's protocol version.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}

/// Every message body that can travel over the cluster bus.
///
/// Grouped by the topic family it is published on; the body is
/// self-describing so handlers never need to parse topic strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageBody {
    // =========================================================================
    // DISCOVERY (`cluster.discovery`)
    // =========================================================================
    /// A node announcing itself on startup.
    Join(PeerAddress),
    /// Periodic liveness signal, also sent once out-of-cycle when a new
    /// peer's `Join` is observed so the joiner converges quickly.
    Heartbeat(PeerAddress),
    /// Graceful shutdown notice; the origin is the leaving node.
    Leave,

    // =========================================================================
    // PRESENCE (`cluster.presence`)
    // =========================================================================
    /// A client connected to the origin node.
    Login { device: DeviceId },
    /// A client disconnected from the origin node.
    Logout { device: DeviceId },

    // =========================================================================
    // RECORDS (`record.data.<name>`)
    // =========================================================================
    /// New state for a record. Applied under last-writer-wins on
    /// `(version, author)`.
    RecordUpdate {
        name: String,
        value: serde_json::Value,
        version: u64,
        /// The node whose `set` produced this version. Not necessarily the
        /// frame's origin: holders republish on read requests.
        author: ServerName,
    },
    /// Request for the current state of a record; every node holding a copy
    /// answers with a `RecordUpdate`.
    RecordRead { name: String },

    // =========================================================================
    // LISTEN CONTROL (`record.listen`)
    // =========================================================================
    /// The origin node gained its first local subscriber for a record name.
    InterestAdded { name: String },
    /// The origin node lost its last local subscriber for a record name.
    InterestRemoved { name: String },
    /// The origin node's listener accepted responsibility for a matched name.
    ListenClaim { name: String },
    /// The origin node released a claim it owned.
    ListenRelease { name: String },

    // =========================================================================
    // EVENTS (`event.<name>`)
    // =========================================================================
    /// Fire-and-forget event; the payload is opaque to the relay.
    Event {
        name: String,
        payload: serde_json::Value,
    },

    // =========================================================================
    // RPC (`rpc.<name>` adverts, private inboxes for calls)
    // =========================================================================
    /// The origin node provides the named procedure.
    Provide { rpc: String },
    /// The origin node no longer provides the named procedure.
    Unprovide { rpc: String },
    /// A call routed to one provider's private inbox; the response goes to
    /// the inbox of this frame's origin.
    RpcRequest {
        correlation_id: Uuid,
        rpc: String,
        arg: serde_json::Value,
    },
    /// The single response for a call, matched by correlation id.
    RpcResponse {
        correlation_id: Uuid,
        result: Result<serde_json::Value, String>,
    },

    // =========================================================================
    // BOOTSTRAP (private inboxes)
    // =========================================================================
    /// Snapshot of a node's locally-authoritative state, sent to a newly
    /// observed peer so it converges without manual resync.
    StateSync(StateSyncPayload),
}

/// Locally-authoritative state one node ships to a newly joined peer.
///
/// Importing this is silent (no presence callbacks) and idempotent. Listen
/// patterns are deliberately absent: notification is always performed by the
/// pattern's own node, so remote patterns are never consulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSyncPayload {
    /// Clients connected directly to the sending node.
    pub presence: Vec<PresenceEntry>,
    /// Procedure names the sending node provides.
    pub providers: Vec<String>,
    /// Record names whose listen claim the sending node currently owns.
    pub claims: Vec<String>,
    /// Record names the sending node holds at least one local subscriber for.
    pub interest: Vec<String>,
}

impl StateSyncPayload {
    /// Whether the snapshot carries anything at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.presence.is_empty()
            && self.providers.is_empty()
            && self.claims.is_empty()
            && self.interest.is_empty()
    }
}
