//! # RPC Mesh Router (ch-05)
//!
//! Routes a procedure call made on any node to exactly one provider,
//! anywhere in the cluster, and relays the single response back.
//!
//! ## Call Routing
//!
//! ```text
//! make("toUpper")          node.node-a (request)        provider
//! [Node B] ────────────────────────────────────────→ [Node A]
//!          ←──────────────────────────────────────── handler runs
//!                          node.node-b (response)
//! ```
//!
//! Providers advertise on `rpc.<name>`; calls and responses travel on the
//! private inboxes, matched by a v4 correlation id. A local provider is
//! invoked directly without touching the wire. Every call resolves exactly
//! once: with the provider's value, the provider's error, a "no response"
//! error when the handler drops its response handle, a routing error when
//! the provider node vanishes mid-call, or a timeout.

pub mod config;
pub mod error;
pub mod responder;
pub mod service;

pub use config::RpcConfig;
pub use error::RpcError;
pub use responder::RpcResponder;
pub use service::{RpcHandler, RpcRouter};
