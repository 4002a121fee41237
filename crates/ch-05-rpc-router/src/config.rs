//! # RPC Configuration

use std::time::Duration;

/// Tunables for call routing.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// How long a caller waits for the single response before the call
    /// fails with a timeout.
    pub call_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
        }
    }
}
