//! # Node Configuration
//!
//! Unified configuration for one cluster node and its components. All
//! timings have sane defaults and can be overridden through `CHORUS_*`
//! environment variables.

use std::time::Duration;

use thiserror::Error;

use ch_01_peer_registry::RegistryConfig;
use ch_03_record_sync::RecordConfig;
use ch_05_rpc_router::RpcConfig;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Cluster-unique name of this node.
    pub server_name: String,
    /// Host advertised to peers.
    pub host: String,
    /// Port advertised to peers.
    pub port: u16,
    /// Peer discovery and liveness settings.
    pub registry: RegistryConfig,
    /// Record synchronizer settings.
    pub records: RecordConfig,
    /// RPC router settings.
    pub rpc: RpcConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server_name: "chorus-node".to_owned(),
            host: "127.0.0.1".to_owned(),
            port: 6021,
            registry: RegistryConfig::default(),
            records: RecordConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from `CHORUS_*` environment variables, falling
    /// back to defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var("CHORUS_SERVER_NAME") {
            config.server_name = name;
        }
        if let Ok(host) = std::env::var("CHORUS_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("CHORUS_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Some(interval) = env_millis("CHORUS_HEARTBEAT_INTERVAL_MS") {
            config.registry.heartbeat_interval = interval;
        }
        if let Some(timeout) = env_millis("CHORUS_LIVENESS_TIMEOUT_MS") {
            config.registry.liveness_timeout = timeout;
        }
        if let Some(timeout) = env_millis("CHORUS_READ_TIMEOUT_MS") {
            config.records.read_timeout = timeout;
        }
        if let Some(timeout) = env_millis("CHORUS_RPC_TIMEOUT_MS") {
            config.rpc.call_timeout = timeout;
        }
        config
    }

    /// Validate the configuration before a node starts with it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_name.is_empty() {
            return Err(ConfigError::MissingServerName);
        }
        if self.server_name.contains('.') {
            return Err(ConfigError::InvalidServerName(self.server_name.clone()));
        }
        if self.registry.liveness_timeout <= self.registry.heartbeat_interval {
            return Err(ConfigError::LivenessWindowTooShort {
                heartbeat: self.registry.heartbeat_interval,
                liveness: self.registry.liveness_timeout,
            });
        }
        Ok(())
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()?
        .parse()
        .ok()
        .map(Duration::from_millis)
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("server name must not be empty")]
    MissingServerName,

    /// Server names become topic segments (`node.<name>`); a dot inside one
    /// would split it into extra segments.
    #[error("server name '{0}' must not contain '.'")]
    InvalidServerName(String),

    /// A liveness window at or below the heartbeat interval evicts every
    /// peer between two heartbeats.
    #[error("liveness timeout {liveness:?} must exceed the heartbeat interval {heartbeat:?}")]
    LivenessWindowTooShort {
        heartbeat: Duration,
        liveness: Duration,
    },
}
