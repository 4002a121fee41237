//! # Chorus Node Runtime
//!
//! Assembles the six components into one running cluster node. All
//! coordination goes through the shared bus; the runtime owns the pump tasks
//! that drain it and the timers that drive heartbeats and liveness sweeps.
//!
//! ## Module Structure
//!
//! - `config` - Unified node configuration with environment overrides
//! - `node` - The `ClusterNode` façade: startup, component accessors, shutdown
//! - `telemetry` - Tracing subscriber setup for the binary
//!
//! Internal modules `pumps` and `wiring` hold the bus pump loops and the
//! cross-component callback graph.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Build the components on the shared bus
//! 3. Wire cross-component callbacks (peer loss cascade, bootstrap sync,
//!    interest edges)
//! 4. Spawn the pumps, the heartbeat timer and the liveness sweep
//! 5. Publish the join announcement

pub mod config;
pub mod node;
pub mod telemetry;

mod pumps;
mod wiring;

pub use config::{ConfigError, NodeConfig};
pub use node::ClusterNode;
