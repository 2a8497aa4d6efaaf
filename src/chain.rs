//! Blockchain Client Capability
//!
//! The deposit manager never talks to an RPC endpoint directly; it
//! consumes a per-network [`ChainClient`] provided by the wallet's
//! provider layer. The trait is the minimum surface the tracker and
//! scanner need: chain head, transaction receipts and the pool
//! contract's commitment log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chain query failures. Always recoverable: callers retry on the next
/// scheduled poll or scan cycle without mutating any tracked state.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("chain query timed out: {0}")]
    Timeout(String),
}

/// Execution outcome recorded in a transaction receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Succeeded,
    Reverted,
}

/// Receipt for a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Block the transaction is currently included in. Reflects the
    /// canonical chain at query time; a reorg can move or remove it.
    pub block_number: u64,
    pub status: ExecutionStatus,
}

/// A commitment recorded by the pool contract's deposit event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentEvent {
    /// Hex-encoded commitment value
    pub commitment: String,
    /// Block the deposit event was emitted in
    pub block_number: u64,
    /// Transaction that carried the deposit
    pub tx_hash: String,
}

/// Per-network blockchain client capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current canonical chain head height
    async fn current_height(&self) -> Result<u64, ChainError>;

    /// Receipt for a transaction, or None if it is not in the canonical
    /// chain (never broadcast, dropped, or reorged out)
    async fn get_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, ChainError>;

    /// Commitments recorded by the pool contract in a block range
    async fn query_commitment_log(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<CommitmentEvent>, ChainError>;
}
