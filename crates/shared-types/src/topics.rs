//! # Topic Scheme
//!
//! Every coordination concern gets its own dot-separated topic family:
//!
//! ```text
//! cluster.discovery        join / heartbeat / leave
//! cluster.presence         login / logout
//! record.listen            interest edges, claims, releases
//! record.data.<name>       updates + read requests for one record
//! event.<name>             one fire-and-forget event name
//! rpc.<name>               provide / unprovide adverts for one procedure
//! node.<server>            a node's private inbox (calls, responses, sync)
//! ```
//!
//! Record data nests under its own `data` segment so a record literally
//! named `listen` can never collide with the listen control topic.

/// Node join / heartbeat / leave traffic.
pub const DISCOVERY: &str = "cluster.discovery";

/// Client login / logout traffic.
pub const PRESENCE: &str = "cluster.presence";

/// Listen interest, claim, and release traffic.
pub const LISTEN: &str = "record.listen";

/// Subscription pattern spanning every record data topic.
pub const ALL_RECORDS: &str = "record.data.>";

/// Subscription pattern spanning every event topic.
pub const ALL_EVENTS: &str = "event.>";

/// Subscription pattern spanning every rpc advert topic.
pub const ALL_RPCS: &str = "rpc.>";

/// Topic carrying updates and read requests for one record.
#[must_use]
pub fn record(name: &str) -> String {
    format!("record.data.{name}")
}

/// Topic carrying one event name.
#[must_use]
pub fn event(name: &str) -> String {
    format!("event.{name}")
}

/// Topic carrying provide/unprovide adverts for one procedure.
#[must_use]
pub fn rpc(name: &str) -> String {
    format!("rpc.{name}")
}

/// A node's private inbox for directed messages.
#[must_use]
pub fn inbox(server: &crate::entities::ServerName) -> String {
    format!("node.{server}")
}
