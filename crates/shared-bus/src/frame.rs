//! # Bus Frames
//!
//! The unit of traffic on the bus: a topic string plus the enveloped
//! message travelling on it.

use serde::{Deserialize, Serialize};
use shared_types::ClusterMessage;

/// One published frame.
///
/// The topic is addressing; the envelope inside carries identity and
/// version. Handlers dispatch on the body, never by re-parsing the topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusFrame {
    /// Dot-separated topic this frame was published on.
    pub topic: String,
    /// The enveloped message.
    pub message: ClusterMessage,
}

impl BusFrame {
    #[must_use]
    pub fn new(topic: impl Into<String>, message: ClusterMessage) -> Self {
        Self {
            topic: topic.into(),
            message,
        }
    }
}
