//! # Event Relay (ch-04)
//!
//! Fire-and-forget pub/sub with no retained state: `emit` publishes the
//! payload to the event's topic and invokes local subscribers directly;
//! remote subscribers receive it through their node's event pump. There is
//! no replay and no delivery guarantee for subscribers attached after the
//! emit.

pub mod service;

pub use service::{EventCallback, EventRelay};
