//! Chorus node binary.
//!
//! Starts one cluster node on the in-memory bus with environment-derived
//! configuration and runs until interrupted. Other nodes in the same process
//! share the bus; cross-process transports plug in behind `MessageBus`.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use node_runtime::{telemetry, ClusterNode, NodeConfig};
use shared_bus::InMemoryMessageBus;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    let config = NodeConfig::from_env();
    info!(
        server = %config.server_name,
        host = %config.host,
        port = config.port,
        "Starting Chorus node"
    );

    let bus = Arc::new(InMemoryMessageBus::new());
    let node = ClusterNode::start(config, bus).await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    node.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}
