//! # Record Synchronizer (ch-03)
//!
//! Replicates named JSON documents across the cluster and pushes updates to
//! local subscribers.
//!
//! ## Replication Model
//!
//! Every `set` increments the record's version and broadcasts
//! `{value, version, author}` on the record's own topic. Receivers apply an
//! update only when `(version, author)` exceeds their local pair -
//! last-writer-wins by version with the author name breaking ties, never by
//! wall clock. Reads hydrate through the same channel: a read request makes
//! every holder republish its current state, and the LWW rule collapses the
//! duplicate answers.
//!
//! ## Hydration States
//!
//! A cached record is either *ready* (holds an authoritative value) or still
//! hydrating. Hydrating entries accept the first update unconditionally;
//! only ready entries answer read requests. A read that no holder answers
//! within the read timeout resolves to a fresh record: null value, version 0.

pub mod config;
pub mod service;

pub use config::RecordConfig;
pub use service::{InterestCallback, RecordCallback, RecordSynchronizer};
