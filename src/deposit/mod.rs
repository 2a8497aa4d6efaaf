//! Blank Deposit Management
//!
//! The lifecycle tracker, reorg-safe scanner and withdrawal resolver for
//! privacy-pool deposit notes.
//!
//! - [`types`] - note records, the status state machine, cursors
//! - [`tracker`] - broadcast recording and confirmation polling
//! - [`scanner`] - forward-window recovery after chain reorganizations
//! - [`resolver`] - withdrawal pairing and spent-flag accounting

pub mod resolver;
pub mod scanner;
pub mod tracker;
pub mod types;

pub use resolver::{WithdrawalCandidate, WithdrawalResolver};
pub use scanner::ReorgScanner;
pub use tracker::{LifecycleTracker, TrackerError};
pub use types::{
    BucketState, DepositNote, DepositStatus, DerivationCursor, NoteStateError, TxReference,
};
