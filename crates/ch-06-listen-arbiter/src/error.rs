//! Errors surfaced by the listen façade.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListenError {
    /// The glob pattern failed to compile.
    #[error("invalid listen pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A handler is already registered for this exact pattern.
    #[error("already listening for pattern '{0}'")]
    AlreadyListening(String),
}
