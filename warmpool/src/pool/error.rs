//! Error types for pool configuration.

use thiserror::Error;

use super::policy::PoolKey;

/// Errors raised while validating pool policies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The pool key is empty or whitespace.
    #[error("Pool key must not be empty")]
    EmptyKey,

    /// A pool must be able to buffer at least one item.
    #[error("Pool '{0}' has capacity 0 (must be at least 1)")]
    ZeroCapacity(PoolKey),

    /// A pool must tolerate at least one failure before cooling down.
    #[error("Pool '{0}' has failure threshold 0 (must be at least 1)")]
    ZeroFailureThreshold(PoolKey),

    /// Two policies share a key.
    #[error("Pool '{0}' is configured more than once")]
    DuplicateKey(PoolKey),

    /// Unrecognised pool kind name.
    #[error("Unknown pool kind '{0}' (expected native, interstitial or rewarded)")]
    UnknownKind(String),
}
