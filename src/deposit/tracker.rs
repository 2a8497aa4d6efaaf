//! Deposit Lifecycle Tracker
//!
//! Owns the mutable status of every derived note that has been recorded:
//! unbroadcast → pending → confirmed | failed
//!
//! # Flow
//! 1. The wallet derives a note and registers it with [`LifecycleTracker::track`]
//! 2. Once the deposit transaction is submitted, [`record_broadcast`] moves
//!    the note to pending
//! 3. Poll cycles query the network's chain client; a receipt at block `h`
//!    confirms the note once the head reaches `h + confirmation_depth` and
//!    the receipt still reports `h`
//! 4. Reverted transactions fail the note at once; dropped or reorged-out
//!    transactions fail only after their receipt has stayed absent for
//!    `max_receipt_polls` cycles, giving re-mined blocks time to surface.
//!    The reorg scanner re-discovers deposits that landed anyway
//!
//! Distinct buckets progress independently. Within a bucket all mutation
//! serializes behind one async lock, so racing chain reads can never apply
//! duplicate transitions.
//!
//! [`record_broadcast`]: LifecycleTracker::record_broadcast

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use super::types::{DepositNote, DepositStatus, DerivationCursor, NoteStateError};
use crate::chain::{ChainClient, ChainError, CommitmentEvent, ExecutionStatus};
use crate::config::{ConfigError, PoolConfig};
use crate::derivation::DerivationError;
use crate::registry::{Bucket, CurrencyAmountPair, PoolNetwork};
use crate::storage::{NoteStore, StorageError};

/// Deposit tracker errors
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("note not found: {bucket}#{index}")]
    NotFound { bucket: String, index: u64 },

    #[error("no chain client configured for {0}")]
    NoClient(PoolNetwork),

    #[error(transparent)]
    State(#[from] NoteStateError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("derivation error: {0}")]
    Derivation(#[from] DerivationError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Tracks every recorded deposit note through its lifecycle
pub struct LifecycleTracker {
    config: PoolConfig,
    store: Arc<dyn NoteStore>,
    clients: HashMap<PoolNetwork, Arc<dyn ChainClient>>,
    /// One async lock per bucket; serializes poll/scan/select passes
    locks: Mutex<HashMap<Bucket, Arc<Mutex<()>>>>,
}

impl LifecycleTracker {
    pub fn new(config: PoolConfig, store: Arc<dyn NoteStore>) -> Self {
        Self {
            config,
            store,
            clients: HashMap::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Attach the chain client for a network
    pub fn with_client(mut self, network: PoolNetwork, client: Arc<dyn ChainClient>) -> Self {
        self.clients.insert(network, client);
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn NoteStore> {
        &self.store
    }

    pub(crate) fn client(&self, network: PoolNetwork) -> Result<&Arc<dyn ChainClient>, TrackerError> {
        self.clients
            .get(&network)
            .ok_or(TrackerError::NoClient(network))
    }

    /// The serialization lock for a bucket
    pub(crate) async fn bucket_lock(&self, bucket: &Bucket) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(bucket.clone()).or_default().clone()
    }

    /// Register a freshly derived, not-yet-broadcast note
    pub async fn track(&self, note: DepositNote) -> Result<(), TrackerError> {
        let lock = self.bucket_lock(&note.bucket).await;
        let _guard = lock.lock().await;

        debug!(bucket = %note.bucket, index = note.index, "tracking derived note");
        self.store.insert_note(&note).await?;
        Ok(())
    }

    /// Next unused derivation index in a bucket
    pub async fn next_index(&self, bucket: &Bucket) -> Result<u64, TrackerError> {
        let notes = self.store.notes_in_bucket(bucket).await?;
        Ok(notes.last().map(|n| n.index + 1).unwrap_or(0))
    }

    /// Record the broadcast deposit transaction for a tracked note,
    /// moving it to pending
    pub async fn record_broadcast(
        &self,
        bucket: &Bucket,
        index: u64,
        tx_hash: String,
    ) -> Result<(), TrackerError> {
        let lock = self.bucket_lock(bucket).await;
        let _guard = lock.lock().await;

        let mut note = self.require_note(bucket, index).await?;
        note.mark_broadcast(tx_hash.clone())?;
        self.store.update_note(&note).await?;

        info!(bucket = %bucket, index, tx = %tx_hash, "deposit broadcast");
        Ok(())
    }

    /// Check a note's on-chain state and apply the resulting transition.
    ///
    /// Idempotent: terminal notes are returned as-is without touching the
    /// chain. Polling the same note concurrently serializes behind the
    /// bucket lock, so at most one status check per note is in flight.
    /// Chain failures propagate without mutating any state; the caller
    /// retries on the next cycle.
    pub async fn poll_status(
        &self,
        bucket: &Bucket,
        index: u64,
    ) -> Result<DepositStatus, TrackerError> {
        let lock = self.bucket_lock(bucket).await;
        let _guard = lock.lock().await;

        self.poll_status_locked(bucket, index).await
    }

    /// Poll body; caller holds the bucket lock
    async fn poll_status_locked(
        &self,
        bucket: &Bucket,
        index: u64,
    ) -> Result<DepositStatus, TrackerError> {
        let mut note = self.require_note(bucket, index).await?;

        if note.status.is_terminal() || note.status == DepositStatus::Unbroadcast {
            return Ok(note.status);
        }

        let Some(tx_ref) = note.tx_ref.clone() else {
            warn!(bucket = %bucket, index, "pending note has no tx reference, skipping");
            return Ok(note.status);
        };

        let client = self.client(bucket.network())?;
        let receipt = client.get_receipt(&tx_ref.hash).await?;

        match receipt {
            None if tx_ref.block_number.is_some() => {
                // Previously included, now absent from the canonical
                // chain: the block was reorged out. Reorged transactions
                // usually re-enter the mempool and get re-mined, so the
                // note stays pending until the absence outlasts the poll
                // bound; the forward scanner rebinds deposits that land
                // again under a different transaction.
                note.receipt_polls += 1;
                if note.receipt_polls >= self.config.max_receipt_polls {
                    warn!(
                        bucket = %bucket,
                        index,
                        tx = %tx_ref.hash,
                        "reorged-out deposit never re-included"
                    );
                    note.mark_failed("reorged out without re-inclusion")?;
                } else {
                    warn!(
                        bucket = %bucket,
                        index,
                        tx = %tx_ref.hash,
                        "reorg detected, awaiting re-inclusion"
                    );
                }
                self.store.update_note(&note).await?;
            }
            None => {
                note.receipt_polls += 1;
                if note.receipt_polls >= self.config.max_receipt_polls {
                    warn!(bucket = %bucket, index, tx = %tx_ref.hash, "deposit transaction dropped");
                    note.mark_failed("transaction dropped: no receipt within poll bound")?;
                }
                self.store.update_note(&note).await?;
            }
            Some(receipt) if receipt.status == ExecutionStatus::Reverted => {
                warn!(bucket = %bucket, index, tx = %tx_ref.hash, "deposit transaction reverted");
                note.mark_failed("transaction reverted")?;
                self.store.update_note(&note).await?;
            }
            Some(receipt) => {
                // The receipt reflects the canonical chain at query time,
                // so its block is the canonicality check.
                let head = client.current_height().await?;
                let depth = self.config.confirmation_depth(bucket.network())?;

                if let Some(prev) = tx_ref.block_number {
                    if prev != receipt.block_number {
                        debug!(
                            bucket = %bucket,
                            index,
                            from = prev,
                            to = receipt.block_number,
                            "deposit moved by reorg, still included"
                        );
                    }
                }

                note.receipt_polls = 0;
                note.record_inclusion(receipt.block_number);

                if head >= receipt.block_number + depth {
                    note.mark_confirmed()?;
                    info!(
                        bucket = %bucket,
                        index,
                        block = receipt.block_number,
                        "deposit confirmed"
                    );
                }
                self.store.update_note(&note).await?;
            }
        }

        if note.status.is_terminal() {
            self.advance_recorded_locked(bucket).await?;
        }

        Ok(note.status)
    }

    /// Poll every pending note in a bucket
    pub async fn poll_bucket(&self, bucket: &Bucket) -> Result<(), TrackerError> {
        let pending = self
            .store
            .notes_by_status(bucket, DepositStatus::Pending)
            .await?;

        for note in pending {
            self.poll_status(bucket, note.index).await?;
        }
        Ok(())
    }

    /// Poll every bucket with recorded state. Per-bucket errors are
    /// logged and do not stop the cycle.
    pub async fn poll_cycle(&self) {
        let buckets = match self.store.buckets().await {
            Ok(buckets) => buckets,
            Err(e) => {
                error!(error = %e, "failed to list buckets");
                return;
            }
        };

        for bucket in buckets {
            if let Err(e) = self.poll_bucket(&bucket).await {
                error!(bucket = %bucket, error = %e, "poll cycle error");
            }
        }
    }

    /// Run the tracker's poll loop on the configured interval
    pub async fn run(&self) {
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            "deposit lifecycle tracker started"
        );

        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_secs));
        loop {
            ticker.tick().await;
            self.poll_cycle().await;
        }
    }

    /// Notes in a bucket with the given status, ordered by index
    pub async fn list_by_status(
        &self,
        bucket: &Bucket,
        status: DepositStatus,
    ) -> Result<Vec<DepositNote>, TrackerError> {
        Ok(self.store.notes_by_status(bucket, status).await?)
    }

    /// Count of withdrawable (confirmed, unspent) deposits per
    /// denomination on a network
    pub async fn available_deposits(
        &self,
        network: PoolNetwork,
    ) -> Result<Vec<(CurrencyAmountPair, u64)>, TrackerError> {
        let mut counts = Vec::new();

        for bucket in self.store.buckets().await? {
            if bucket.network() != network {
                continue;
            }
            let withdrawable = self
                .store
                .notes_in_bucket(&bucket)
                .await?
                .iter()
                .filter(|n| n.is_withdrawable())
                .count() as u64;
            counts.push((bucket.pair().clone(), withdrawable));
        }

        Ok(counts)
    }

    /// Ingest a deposit the scanner found on chain but the tracker did
    /// not know about. Caller holds the bucket lock.
    pub(crate) async fn ingest_scanned(
        &self,
        mut note: DepositNote,
        event: &CommitmentEvent,
        confirmed: bool,
    ) -> Result<(), TrackerError> {
        note.mark_broadcast(event.tx_hash.clone())?;
        note.record_inclusion(event.block_number);
        if confirmed {
            note.mark_confirmed()?;
        }

        info!(
            bucket = %note.bucket,
            index = note.index,
            block = event.block_number,
            status = %note.status,
            "recovered on-chain deposit"
        );

        self.store.insert_note(&note).await?;
        Ok(())
    }

    /// Advance the recorded cursor past the contiguous settled prefix.
    /// Gaps of undetermined notes hold the cursor so they are retried on
    /// every scan pass rather than skipped. Caller holds the bucket lock.
    pub(crate) async fn advance_recorded_locked(
        &self,
        bucket: &Bucket,
    ) -> Result<DerivationCursor, TrackerError> {
        let mut cursor = self.store.cursor(bucket).await?;
        let notes = self.store.notes_in_bucket(bucket).await?;
        let by_index: HashMap<u64, &DepositNote> = notes.iter().map(|n| (n.index, n)).collect();

        let mut recorded = cursor.recorded();
        while by_index
            .get(&recorded)
            .map(|n| n.status.is_terminal())
            .unwrap_or(false)
        {
            recorded += 1;
        }

        cursor.set_recorded(recorded);
        self.store.set_cursor(bucket, cursor).await?;
        Ok(cursor)
    }

    async fn require_note(&self, bucket: &Bucket, index: u64) -> Result<DepositNote, TrackerError> {
        self.store
            .get_note(bucket, index)
            .await?
            .ok_or_else(|| TrackerError::NotFound {
                bucket: bucket.to_string(),
                index,
            })
    }
}
