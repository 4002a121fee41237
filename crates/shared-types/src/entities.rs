//! # Cluster Entities
//!
//! Identity value objects shared by every subsystem. All of them are cheap
//! to clone and serialize as plain JSON strings/objects on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::Timestamp;

/// Cluster-unique name of a server node.
///
/// Doubles as the total order used for deterministic tie-breaking (record
/// version ties, crossing listen claims), so it derives `Ord`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerName(String);

impl ServerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerName {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Client-chosen unique identity of a connected client.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Address of a sibling server node. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddress {
    /// Cluster-unique server name.
    pub server: ServerName,
    /// Reachable host of the node.
    pub host: String,
    /// Port the node serves clients on.
    pub port: u16,
    /// Internal connection identifier, fresh per process start. Lets peers
    /// distinguish a restarted node from a duplicate announcement.
    pub connection_id: Uuid,
}

impl PeerAddress {
    /// Create an address with a fresh connection identifier.
    #[must_use]
    pub fn new(server: impl Into<ServerName>, host: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            host: host.into(),
            port,
            connection_id: Uuid::new_v4(),
        }
    }
}

impl std::fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.server, self.host, self.port)
    }
}

/// One connected client as seen by the whole cluster.
///
/// A node is authoritative only for the entries whose `origin` is itself;
/// every other entry is a replica learned over the presence topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// The client identity.
    pub device: DeviceId,
    /// The node the client is connected to.
    pub origin: ServerName,
    /// Last time the origin confirmed the client (login or refresh).
    pub last_seen: Timestamp,
}
