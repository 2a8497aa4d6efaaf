//! Deposit Note Types
//!
//! Types for tracking blank deposits through their lifecycle:
//! unbroadcast → pending → confirmed | failed
//!
//! The status machine is explicit: every status change goes through
//! [`DepositNote::transition_to`], which rejects illegal source/target
//! combinations. Confirmed and failed are terminal; the only mutation
//! allowed on a confirmed note afterwards is the one-shot spent flag.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::Bucket;

/// Status of a deposit note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    /// Derived in memory, no deposit transaction submitted yet
    Unbroadcast,
    /// Deposit transaction submitted, awaiting confirmation depth
    Pending,
    /// Deposit final at the network's confirmation depth (terminal)
    Confirmed,
    /// Dropped, reverted, or reorged out without re-inclusion (terminal)
    Failed,
}

impl DepositStatus {
    /// Whether the status accepts no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, DepositStatus::Confirmed | DepositStatus::Failed)
    }

    /// Whether the note's on-chain outcome is still undetermined
    pub fn is_undetermined(&self) -> bool {
        !self.is_terminal()
    }

    /// Legal transitions of the deposit state machine
    pub fn can_transition_to(self, next: DepositStatus) -> bool {
        matches!(
            (self, next),
            (DepositStatus::Unbroadcast, DepositStatus::Pending)
                | (DepositStatus::Pending, DepositStatus::Confirmed)
                | (DepositStatus::Pending, DepositStatus::Failed)
        )
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbroadcast => write!(f, "unbroadcast"),
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Note state violations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoteStateError {
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition {
        from: DepositStatus,
        to: DepositStatus,
    },

    #[error("cannot spend a note in status {0}")]
    NotConfirmed(DepositStatus),

    #[error("note already spent")]
    AlreadySpent,
}

/// On-chain reference for a broadcast deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReference {
    /// Hex-encoded transaction hash
    pub hash: String,
    /// Block the transaction was last seen included in
    pub block_number: Option<u64>,
}

/// A derived deposit note and its tracked lifecycle state.
///
/// The commitment is public once deposited; nullifier and secret stay
/// local and are only surfaced to the withdrawal prover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositNote {
    /// Bucket this note belongs to
    pub bucket: Bucket,
    /// Derivation index within the bucket, strictly increasing
    pub index: u64,
    /// Hex-encoded commitment recorded by the pool contract
    pub commitment: String,
    /// Hex-encoded nullifier (secret)
    pub nullifier: String,
    /// Hex-encoded note secret
    pub secret: String,
    /// Current lifecycle status
    pub status: DepositStatus,
    /// Deposit transaction, once broadcast
    pub tx_ref: Option<TxReference>,
    /// Set once by the withdrawal resolver on a confirmed note
    pub spent: bool,
    /// Poll cycles without a receipt while pending
    pub receipt_polls: u32,
    /// Failure reason, if failed
    pub error: Option<String>,
    /// Timestamp the note was first recorded
    pub created_at: u64,
    /// Timestamp of the last state change
    pub updated_at: u64,
}

impl DepositNote {
    /// Create a freshly derived, not-yet-broadcast note
    pub fn new(
        bucket: Bucket,
        index: u64,
        commitment: String,
        nullifier: String,
        secret: String,
    ) -> Self {
        let now = unix_now();
        Self {
            bucket,
            index,
            commitment,
            nullifier,
            secret,
            status: DepositStatus::Unbroadcast,
            tx_ref: None,
            spent: false,
            receipt_polls: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status transition, rejecting illegal ones. Stale or
    /// out-of-order reports against a terminal note land here and are
    /// refused.
    pub fn transition_to(&mut self, next: DepositStatus) -> Result<(), NoteStateError> {
        if !self.status.can_transition_to(next) {
            return Err(NoteStateError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Record the broadcast deposit transaction and move to pending
    pub fn mark_broadcast(&mut self, tx_hash: String) -> Result<(), NoteStateError> {
        self.transition_to(DepositStatus::Pending)?;
        self.tx_ref = Some(TxReference {
            hash: tx_hash,
            block_number: None,
        });
        Ok(())
    }

    /// Record the block the deposit transaction is included in
    pub fn record_inclusion(&mut self, block_number: u64) {
        if let Some(tx_ref) = &mut self.tx_ref {
            tx_ref.block_number = Some(block_number);
            self.touch();
        }
    }

    /// Point a pending note at a replacement inclusion after its
    /// original block was reorged out
    pub fn rebind_tx(&mut self, tx_hash: String, block_number: u64) {
        self.tx_ref = Some(TxReference {
            hash: tx_hash,
            block_number: Some(block_number),
        });
        self.receipt_polls = 0;
        self.touch();
    }

    /// Move a pending note to confirmed
    pub fn mark_confirmed(&mut self) -> Result<(), NoteStateError> {
        self.transition_to(DepositStatus::Confirmed)
    }

    /// Move a pending note to failed with a reason
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), NoteStateError> {
        self.transition_to(DepositStatus::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }

    /// Set the spent flag. Allowed exactly once, on a confirmed note.
    pub fn mark_spent(&mut self) -> Result<(), NoteStateError> {
        if self.status != DepositStatus::Confirmed {
            return Err(NoteStateError::NotConfirmed(self.status));
        }
        if self.spent {
            return Err(NoteStateError::AlreadySpent);
        }
        self.spent = true;
        self.touch();
        Ok(())
    }

    /// Confirmed and not yet spent
    pub fn is_withdrawable(&self) -> bool {
        self.status == DepositStatus::Confirmed && !self.spent
    }

    fn touch(&mut self) {
        self.updated_at = unix_now();
    }
}

/// Per-bucket derivation bookkeeping.
///
/// `recorded` is the lowest index whose note has not yet settled (every
/// index below it is confirmed or failed); `frontier` is the highest
/// index the reorg scanner has looked ahead to. `frontier >= recorded`
/// always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationCursor {
    recorded: u64,
    frontier: u64,
}

impl DerivationCursor {
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn frontier(&self) -> u64 {
        self.frontier
    }

    /// Advance the recorded cursor. The frontier follows if needed so the
    /// invariant never breaks.
    pub fn set_recorded(&mut self, recorded: u64) {
        self.recorded = recorded;
        if self.frontier < recorded {
            self.frontier = recorded;
        }
    }

    /// Push the scanned frontier forward. Never regresses.
    pub fn extend_frontier(&mut self, frontier: u64) {
        if frontier > self.frontier {
            self.frontier = frontier;
        }
    }
}

/// Persisted state for one bucket: cursor plus notes keyed by index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketState {
    pub cursor: DerivationCursor,
    pub notes: BTreeMap<u64, DepositNote>,
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Currency, CurrencyAmountPair, PoolNetwork};

    fn test_note() -> DepositNote {
        let pair = CurrencyAmountPair::new(Currency::Eth, "1").unwrap();
        let bucket = Bucket::new(PoolNetwork::Mainnet, pair).unwrap();
        DepositNote::new(
            bucket,
            0,
            "c".repeat(64),
            "n".repeat(64),
            "s".repeat(64),
        )
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut note = test_note();
        assert_eq!(note.status, DepositStatus::Unbroadcast);

        note.mark_broadcast("0xabc".to_string()).unwrap();
        assert_eq!(note.status, DepositStatus::Pending);

        note.record_inclusion(100);
        assert_eq!(note.tx_ref.as_ref().unwrap().block_number, Some(100));

        note.mark_confirmed().unwrap();
        assert_eq!(note.status, DepositStatus::Confirmed);
        assert!(note.is_withdrawable());
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut note = test_note();
        note.mark_broadcast("0xabc".to_string()).unwrap();
        note.mark_confirmed().unwrap();

        assert_eq!(
            note.transition_to(DepositStatus::Pending),
            Err(NoteStateError::IllegalTransition {
                from: DepositStatus::Confirmed,
                to: DepositStatus::Pending,
            })
        );
        assert!(note.transition_to(DepositStatus::Failed).is_err());

        let mut failed = test_note();
        failed.mark_broadcast("0xdef".to_string()).unwrap();
        failed.mark_failed("reverted").unwrap();
        assert!(failed.transition_to(DepositStatus::Pending).is_err());
        assert!(failed.transition_to(DepositStatus::Confirmed).is_err());
    }

    #[test]
    fn test_unbroadcast_cannot_confirm_directly() {
        let mut note = test_note();
        assert!(note.mark_confirmed().is_err());
        assert!(note.mark_failed("nope").is_err());
    }

    #[test]
    fn test_spent_flag_once_on_confirmed_only() {
        let mut note = test_note();
        assert_eq!(
            note.mark_spent(),
            Err(NoteStateError::NotConfirmed(DepositStatus::Unbroadcast))
        );

        note.mark_broadcast("0xabc".to_string()).unwrap();
        note.mark_confirmed().unwrap();

        note.mark_spent().unwrap();
        assert!(!note.is_withdrawable());
        assert_eq!(note.mark_spent(), Err(NoteStateError::AlreadySpent));
    }

    #[test]
    fn test_cursor_invariant() {
        let mut cursor = DerivationCursor::default();
        cursor.extend_frontier(10);
        assert_eq!(cursor.frontier(), 10);
        assert_eq!(cursor.recorded(), 0);

        cursor.set_recorded(4);
        assert!(cursor.frontier() >= cursor.recorded());

        // recorded past the frontier drags the frontier along
        cursor.set_recorded(15);
        assert_eq!(cursor.frontier(), 15);

        // frontier never regresses
        cursor.extend_frontier(3);
        assert_eq!(cursor.frontier(), 15);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(DepositStatus::Pending.to_string(), "pending");
        assert_eq!(DepositStatus::Confirmed.to_string(), "confirmed");
        assert_eq!(DepositStatus::Failed.to_string(), "failed");
    }
}
