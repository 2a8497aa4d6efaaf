//! Common Error Types
//!
//! Root error type unifying the module-level errors for embedders that
//! want a single failure surface.

use thiserror::Error;

use crate::chain::ChainError;
use crate::config::ConfigError;
use crate::deposit::tracker::TrackerError;
use crate::deposit::types::NoteStateError;
use crate::derivation::DerivationError;
use crate::logging::LoggingError;
use crate::storage::StorageError;

/// Root error type for the deposit manager
#[derive(Debug, Error)]
pub enum PoolError {
    /// Invalid pair, unknown network: rejected before any derivation,
    /// never retried
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Key capability unavailable or index out of bound: fatal for the
    /// request, stored state untouched
    #[error("derivation error: {0}")]
    Derivation(#[from] DerivationError),

    /// RPC failure during polling or scanning: recoverable, retried on
    /// the next cycle
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Note store failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Lifecycle, scan or selection failure
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// Illegal state-machine transition
    #[error("note state error: {0}")]
    NoteState(#[from] NoteStateError),

    /// Logging setup failure
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
}

impl PoolError {
    /// Whether the caller should retry later without intervention
    pub fn is_retryable(&self) -> bool {
        match self {
            PoolError::Chain(_) | PoolError::Storage(_) => true,
            PoolError::Tracker(t) => matches!(
                t,
                TrackerError::Chain(_) | TrackerError::Storage(_)
            ),
            _ => false,
        }
    }
}

/// Result type alias using PoolError
pub type Result<T> = std::result::Result<T, PoolError>;
