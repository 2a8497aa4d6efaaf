//! Reorg-Safe Forward Scanner
//!
//! Notes are derived at strictly increasing indices, so a reorg that
//! invalidates the deposit at index `i` must not leave a permanent hole:
//! a later deposit may already sit at `i + 1`, or the wallet will re-use
//! the slot. Each pass re-derives a forward window of indices past the
//! recorded cursor and checks the pool contract's commitment log for
//! deposits the tracker does not know about yet.

use std::sync::Arc;

use tracing::{debug, info};

use super::tracker::{LifecycleTracker, TrackerError};
use super::types::{DepositStatus, DerivationCursor};
use crate::derivation::NoteDeriver;
use crate::registry::Bucket;

/// Scans forward derivation windows to recover deposits orphaned by
/// chain reorganizations
pub struct ReorgScanner {
    tracker: Arc<LifecycleTracker>,
    deriver: NoteDeriver,
}

impl ReorgScanner {
    pub fn new(tracker: Arc<LifecycleTracker>, deriver: NoteDeriver) -> Self {
        Self { tracker, deriver }
    }

    /// Scan one bucket's forward window.
    ///
    /// For each index in `[recorded, recorded + derivations_forward)` the
    /// note is re-derived; if its commitment appears in the on-chain log
    /// but the tracker has no record of it, the deposit is ingested as
    /// pending or confirmed depending on its current depth. Pending notes
    /// whose commitment shows up under a different transaction are
    /// rebound to that inclusion. The recorded cursor then advances only
    /// past the settled prefix, so undetermined gaps below the frontier
    /// are retried on every pass.
    pub async fn scan_bucket(&self, bucket: &Bucket) -> Result<DerivationCursor, TrackerError> {
        let lock = self.tracker.bucket_lock(bucket).await;
        let _guard = lock.lock().await;

        let store = self.tracker.store();
        let cursor = store.cursor(bucket).await?;
        let base = cursor.recorded();
        let forward = self
            .tracker
            .config()
            .derivations_forward(bucket.network())?;
        let depth = self
            .tracker
            .config()
            .confirmation_depth(bucket.network())?;

        let client = self.tracker.client(bucket.network())?;
        let head = client.current_height().await?;
        // Bounded log query; a full-history rescan would grow with the
        // chain, not with the window.
        let from_block = head.saturating_sub(self.tracker.config().scan_lookback_blocks);
        let events = client.query_commitment_log(from_block, head).await?;

        debug!(
            bucket = %bucket,
            base,
            window = forward,
            from_block,
            events = events.len(),
            "scanning forward window"
        );

        for index in base..base + forward {
            if let Some(mut note) = store.get_note(bucket, index).await? {
                // Already tracked; the poll loop owns its lifecycle. One
                // exception: a pending note whose block was reorged out
                // may have been re-mined under a different transaction,
                // and the poll loop would never find the old hash again.
                // Rebind it to the inclusion the log reports.
                if note.status == DepositStatus::Pending {
                    if let Some(event) = events.iter().find(|e| e.commitment == note.commitment) {
                        let stale = note
                            .tx_ref
                            .as_ref()
                            .map(|t| t.hash != event.tx_hash)
                            .unwrap_or(true);
                        if stale {
                            note.rebind_tx(event.tx_hash.clone(), event.block_number);
                            if head >= event.block_number + depth {
                                note.mark_confirmed()?;
                            }
                            info!(
                                bucket = %bucket,
                                index,
                                block = event.block_number,
                                tx = %event.tx_hash,
                                status = %note.status,
                                "rebound deposit to replacement inclusion"
                            );
                            store.update_note(&note).await?;
                        }
                    }
                }
                continue;
            }

            let note = self.deriver.derive_note(bucket, index)?;
            let Some(event) = events.iter().find(|e| e.commitment == note.commitment) else {
                continue;
            };

            let confirmed = head >= event.block_number + depth;
            self.tracker.ingest_scanned(note, event, confirmed).await?;
        }

        let mut cursor = self.tracker.advance_recorded_locked(bucket).await?;
        cursor.extend_frontier(base + forward);
        store.set_cursor(bucket, cursor).await?;

        Ok(cursor)
    }

    /// Scan every bucket with recorded state. Per-bucket errors are
    /// logged and do not stop the pass.
    pub async fn scan_all(&self) -> Result<(), TrackerError> {
        for bucket in self.tracker.store().buckets().await? {
            if let Err(e) = self.scan_bucket(&bucket).await {
                tracing::error!(bucket = %bucket, error = %e, "scan pass error");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::chain::{CommitmentEvent, ExecutionStatus, MockChainClient, TxReceipt};
    use crate::config::PoolConfig;
    use crate::derivation::SeedKeyDeriver;
    use crate::registry::{Currency, CurrencyAmountPair, PoolNetwork};
    use crate::storage::MemoryNoteStore;

    fn eth_bucket() -> Bucket {
        let pair = CurrencyAmountPair::new(Currency::Eth, "1").unwrap();
        Bucket::new(PoolNetwork::Mainnet, pair).unwrap()
    }

    fn deriver() -> NoteDeriver {
        NoteDeriver::new(Arc::new(SeedKeyDeriver::new([9u8; 32])))
    }

    fn commitment_at(index: u64) -> String {
        deriver().derive_note(&eth_bucket(), index).unwrap().commitment
    }

    fn scanner_with(client: MockChainClient) -> ReorgScanner {
        let tracker = Arc::new(
            LifecycleTracker::new(PoolConfig::default(), Arc::new(MemoryNoteStore::new()))
                .with_client(PoolNetwork::Mainnet, Arc::new(client)),
        );
        ReorgScanner::new(tracker, deriver())
    }

    #[tokio::test]
    async fn test_recovers_unknown_deposit_from_log() {
        // commitment for index 0 is on chain, deep enough to be final
        let mut client = MockChainClient::new();
        client.expect_current_height().returning(|| Ok(200));
        client.expect_query_commitment_log().returning(|_, _| {
            Ok(vec![CommitmentEvent {
                commitment: commitment_at(0),
                block_number: 100,
                tx_hash: "0xrecovered".to_string(),
            }])
        });

        let scanner = scanner_with(client);
        let cursor = scanner.scan_bucket(&eth_bucket()).await.unwrap();

        let note = scanner
            .tracker
            .store()
            .get_note(&eth_bucket(), 0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(note.status, DepositStatus::Confirmed);
        assert_eq!(note.tx_ref.unwrap().hash, "0xrecovered");

        // index 0 settled, nothing at index 1: recorded stops there
        assert_eq!(cursor.recorded(), 1);
        assert_eq!(cursor.frontier(), 10);
        assert!(cursor.frontier() >= cursor.recorded());
    }

    #[tokio::test]
    async fn test_shallow_deposit_ingested_as_pending() {
        // on chain at block 100, head 102, depth 4: not yet final
        let mut client = MockChainClient::new();
        client.expect_current_height().returning(|| Ok(102));
        client.expect_query_commitment_log().returning(|_, _| {
            Ok(vec![CommitmentEvent {
                commitment: commitment_at(0),
                block_number: 100,
                tx_hash: "0xshallow".to_string(),
            }])
        });

        let scanner = scanner_with(client);
        let cursor = scanner.scan_bucket(&eth_bucket()).await.unwrap();

        let note = scanner
            .tracker
            .store()
            .get_note(&eth_bucket(), 0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(note.status, DepositStatus::Pending);

        // undetermined note holds the recorded cursor
        assert_eq!(cursor.recorded(), 0);
        assert_eq!(cursor.frontier(), 10);
    }

    #[tokio::test]
    async fn test_empty_log_leaves_no_notes() {
        let mut client = MockChainClient::new();
        client.expect_current_height().returning(|| Ok(200));
        client
            .expect_query_commitment_log()
            .returning(|_, _| Ok(vec![]));

        let scanner = scanner_with(client);
        let cursor = scanner.scan_bucket(&eth_bucket()).await.unwrap();

        assert!(scanner
            .tracker
            .store()
            .notes_in_bucket(&eth_bucket())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(cursor.recorded(), 0);
        assert_eq!(cursor.frontier(), 10);
    }

    #[tokio::test]
    async fn test_reorged_slot_replaced_by_later_index() {
        // Scenario: the deposit at index 3 was reorged out and its
        // commitment never landed again; the wallet re-deposited and the
        // commitment for index 4 is in the log. The scanner surfaces
        // index 4 as pending.
        let mut client = MockChainClient::new();

        let receipts = AtomicUsize::new(0);
        client.expect_get_receipt().returning(move |_| {
            // first poll sees inclusion, second poll sees it reorged out
            if receipts.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Some(TxReceipt {
                    block_number: 100,
                    status: ExecutionStatus::Succeeded,
                }))
            } else {
                Ok(None)
            }
        });
        client.expect_current_height().returning(|| Ok(101));
        client.expect_query_commitment_log().returning(|_, _| {
            Ok(vec![CommitmentEvent {
                commitment: commitment_at(4),
                block_number: 101,
                tx_hash: "0xreplacement".to_string(),
            }])
        });

        let mut config = PoolConfig::default();
        config.max_receipt_polls = 1;
        let tracker = Arc::new(
            LifecycleTracker::new(config, Arc::new(MemoryNoteStore::new()))
                .with_client(PoolNetwork::Mainnet, Arc::new(client)),
        );

        // track and broadcast index 3, then watch it fail via reorg
        let note3 = deriver().derive_note(&eth_bucket(), 3).unwrap();
        tracker.track(note3).await.unwrap();
        tracker
            .record_broadcast(&eth_bucket(), 3, "0xdoomed".to_string())
            .await
            .unwrap();
        tracker.poll_status(&eth_bucket(), 3).await.unwrap();
        let status = tracker.poll_status(&eth_bucket(), 3).await.unwrap();
        assert_eq!(status, DepositStatus::Failed);

        let scanner = ReorgScanner::new(tracker.clone(), deriver());
        scanner.scan_bucket(&eth_bucket()).await.unwrap();

        let recovered = tracker
            .store()
            .get_note(&eth_bucket(), 4)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recovered.status, DepositStatus::Pending);
        assert_eq!(recovered.tx_ref.unwrap().hash, "0xreplacement");
    }

    #[tokio::test]
    async fn test_rebinds_pending_note_to_replacement_inclusion() {
        // The deposit at index 3 was included at block 100, reorged out,
        // and re-mined under a different transaction at block 101. Polls
        // on the old hash keep coming back empty, but the scan pass finds
        // the commitment in the log and rebinds the note; head 200 with
        // depth 4 confirms it on the spot. The deposit must stay
        // withdrawable, not drift into failed.
        let receipts = AtomicUsize::new(0);
        let mut client = MockChainClient::new();
        client.expect_get_receipt().returning(move |_| {
            if receipts.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Some(TxReceipt {
                    block_number: 100,
                    status: ExecutionStatus::Succeeded,
                }))
            } else {
                Ok(None)
            }
        });
        let heights = AtomicUsize::new(0);
        client.expect_current_height().returning(move || {
            Ok(if heights.fetch_add(1, Ordering::SeqCst) == 0 {
                101
            } else {
                200
            })
        });
        client.expect_query_commitment_log().returning(|_, _| {
            Ok(vec![CommitmentEvent {
                commitment: commitment_at(3),
                block_number: 101,
                tx_hash: "0xremined".to_string(),
            }])
        });

        let tracker = Arc::new(
            LifecycleTracker::new(PoolConfig::default(), Arc::new(MemoryNoteStore::new()))
                .with_client(PoolNetwork::Mainnet, Arc::new(client)),
        );
        let note3 = deriver().derive_note(&eth_bucket(), 3).unwrap();
        tracker.track(note3).await.unwrap();
        tracker
            .record_broadcast(&eth_bucket(), 3, "0xorphaned".to_string())
            .await
            .unwrap();

        tracker.poll_status(&eth_bucket(), 3).await.unwrap();
        let status = tracker.poll_status(&eth_bucket(), 3).await.unwrap();
        assert_eq!(status, DepositStatus::Pending);

        let scanner = ReorgScanner::new(tracker.clone(), deriver());
        scanner.scan_bucket(&eth_bucket()).await.unwrap();

        let note = tracker
            .store()
            .get_note(&eth_bucket(), 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(note.status, DepositStatus::Confirmed);
        assert_eq!(note.tx_ref.unwrap().hash, "0xremined");

        let counts = tracker
            .available_deposits(PoolNetwork::Mainnet)
            .await
            .unwrap();
        assert_eq!(counts, vec![(eth_bucket().pair().clone(), 1)]);
    }

    #[tokio::test]
    async fn test_log_query_bounded_by_lookback() {
        let mut client = MockChainClient::new();
        client.expect_current_height().returning(|| Ok(50_000));
        client
            .expect_query_commitment_log()
            .withf(|from, to| *from == 40_000 && *to == 50_000)
            .returning(|_, _| Ok(vec![]));

        let scanner = scanner_with(client);
        scanner.scan_bucket(&eth_bucket()).await.unwrap();
    }

    #[tokio::test]
    async fn test_frontier_invariant_over_repeated_passes() {
        let mut client = MockChainClient::new();
        client.expect_current_height().returning(|| Ok(500));
        client
            .expect_query_commitment_log()
            .returning(|_, _| Ok(vec![]));

        let scanner = scanner_with(client);
        for _ in 0..3 {
            let cursor = scanner.scan_bucket(&eth_bucket()).await.unwrap();
            assert!(cursor.frontier() >= cursor.recorded());
        }
    }
}
