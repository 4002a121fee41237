//! # Registry Configuration

use std::time::Duration;

/// Tunables for membership detection.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How often this node publishes a heartbeat.
    pub heartbeat_interval: Duration,
    /// How long a peer may stay silent before it is swept from the set.
    /// Must comfortably exceed `heartbeat_interval` or healthy peers flap.
    pub liveness_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(1),
            liveness_timeout: Duration::from_millis(3_500),
        }
    }
}

impl RegistryConfig {
    /// Cadence of the expiry sweep. Half the heartbeat interval keeps the
    /// detection window tight without letting the sweep dominate the reactor.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        self.heartbeat_interval / 2
    }
}
