//! blankpool - Privacy-Pool Blank Deposit Manager
//!
//! The deposit-management core of a multi-chain wallet's privacy pool
//! integration: it derives anonymous deposit notes from a wallet seed,
//! tracks their on-chain confirmation lifecycle under per-network
//! finality assumptions, survives chain reorganizations without losing
//! or double-counting funds, and pairs withdrawal requests with eligible
//! notes.
//!
//! ## Components
//!
//! 1. **Registry** - fixed (network, currency) → denomination tables
//! 2. **Derivation Engine** - deterministic note derivation by index
//! 3. **Lifecycle Tracker** - unbroadcast → pending → confirmed | failed
//! 4. **Reorg Scanner** - forward-window recovery of orphaned deposits
//! 5. **Withdrawal Resolver** - oldest-first pairing with spent accounting
//!
//! ## External capabilities
//!
//! The crate never opens a socket or touches a disk itself. The wallet
//! supplies a [`chain::ChainClient`] per network, a
//! [`derivation::KeyDeriver`] over its key hierarchy, and a durable
//! [`storage::NoteStore`]; zero-knowledge proof generation consumes the
//! selected [`deposit::WithdrawalCandidate`] and is entirely external.

pub mod chain;
pub mod common;
pub mod config;
pub mod deposit;
pub mod derivation;
pub mod logging;
pub mod registry;
pub mod storage;

// Re-exports: registry
pub use registry::{allowed_amounts, currencies_for, valid_pair};
pub use registry::{Bucket, Currency, CurrencyAmountPair, PoolNetwork};

// Re-exports: configuration
pub use config::{
    ConfigError, NetworkDescriptor, PoolConfig, DEFAULT_DEPOSIT_CONFIRMATIONS,
    DEFAULT_SCAN_LOOKBACK_BLOCKS, DERIVATIONS_FORWARD,
};

// Re-exports: derivation
pub use derivation::{
    DerivationError, DerivationPath, KeyDeriver, NoteDeriver, NoteKeyMaterial, SeedKeyDeriver,
    MAX_DERIVATION_INDEX,
};

// Re-exports: chain capability
pub use chain::{ChainClient, ChainError, CommitmentEvent, ExecutionStatus, TxReceipt};

// Re-exports: deposit lifecycle
pub use deposit::{
    DepositNote, DepositStatus, DerivationCursor, LifecycleTracker, NoteStateError, ReorgScanner,
    TrackerError, TxReference, WithdrawalCandidate, WithdrawalResolver,
};

// Re-exports: storage
pub use storage::{MemoryNoteStore, NoteStore, StorageError, StorageResult};

// Re-exports: errors and logging
pub use common::{PoolError, Result};
pub use logging::{init_logging, LogLevel, LoggingError};
