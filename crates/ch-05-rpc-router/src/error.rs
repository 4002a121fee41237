//! # RPC Errors
//!
//! Every `make` call resolves to a value or exactly one of these, never
//! silence.

use thiserror::Error;

/// Errors delivered to an RPC caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// No node currently provides the procedure.
    #[error("No provider for rpc '{0}'")]
    NoProvider(String),

    /// No response arrived within the call timeout.
    #[error("Rpc '{0}' timed out")]
    Timeout(String),

    /// The provider node left the cluster while the call was in flight.
    #[error("Provider for rpc '{0}' disappeared mid-call")]
    ProviderLost(String),

    /// The provider's handler dropped its response handle without
    /// responding.
    #[error("Provider sent no response for rpc '{0}'")]
    NoResponse(String),

    /// The provider's handler reported an error.
    #[error("Remote handler error: {0}")]
    Remote(String),
}
