//! # Listener Arbiter (ch-06)
//!
//! Lets a node claim wildcard-matched record subscriptions and produce their
//! values just-in-time, with the cluster agreeing on exactly one producer per
//! matched name.
//!
//! ## Claim Lifecycle
//!
//! ```text
//!            interest edge               notification round
//! record.listen ───────────→ [every listening node] ─→ handler(name, true, handle)
//!                                                          │ accept()
//!                            record.listen (claim)         ▼
//!            [other nodes] ←─────────────────────── [accepting node]
//! ```
//!
//! Listen patterns stay local to the node that registered them; only interest
//! edges, claims and releases travel the bus. Crossing claims are resolved by
//! the lexicographically smaller server name, and the displaced handler is
//! told it is no longer serving. When a claim owner releases or vanishes, any
//! remaining interest triggers a fresh notification round.

pub mod error;
pub mod responder;
pub mod service;

pub use error::ListenError;
pub use responder::ListenResponder;
pub use service::{ListenHandler, ListenerArbiter};
