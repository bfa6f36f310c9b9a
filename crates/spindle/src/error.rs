//! Pool error types

use std::time::Duration;

/// Errors returned by pool construction and submission
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Capacity is zero, or pre-allocation was requested for an unbounded pool
    #[error("invalid size for pool")]
    InvalidSize,

    /// Expiry passed to the timing constructor is negative
    #[error("invalid expiry for pool")]
    InvalidExpiry,

    /// Submission after release
    #[error("pool is closed")]
    PoolClosed,

    /// No worker obtainable under the current admission policy
    #[error("pool overloaded: no idle worker and admission refused")]
    PoolOverloaded,

    /// Workers were still running when the release deadline passed
    #[error("workers still running after {0:?}")]
    ReleaseTimeout(Duration),

    /// The OS refused to start a worker or reclaimer thread
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl PoolError {
    /// Whether a caller may reasonably retry the same submission later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolOverloaded | Self::Spawn(_))
    }
}

/// Result alias for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;
