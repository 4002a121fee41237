//! # Record Configuration

use std::time::Duration;

/// Tunables for record hydration.
#[derive(Debug, Clone)]
pub struct RecordConfig {
    /// How long a read waits for some holder to answer before the record is
    /// treated as new.
    pub read_timeout: Duration,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
        }
    }
}
