//! Withdrawal Pairing Resolver
//!
//! Pairs a withdrawal request with an eligible deposit note: the
//! lowest-index confirmed, unspent note in the requested bucket
//! (oldest-first keeps the unspent set small and auditable). Selection
//! and the spent flag apply atomically under the bucket lock, so two
//! racing requests can never receive the same note; the loser simply
//! sees no eligible note and falls back to creating a fresh deposit.

use std::sync::Arc;

use tracing::info;

use super::tracker::{LifecycleTracker, TrackerError};
use super::types::DepositNote;
use crate::registry::Bucket;

/// A note selected for withdrawal, carrying the secret material the
/// external prover needs to build the withdrawal proof.
#[derive(Debug, Clone)]
pub struct WithdrawalCandidate {
    pub note: DepositNote,
}

impl WithdrawalCandidate {
    /// Hex-encoded nullifier revealed at withdrawal
    pub fn nullifier(&self) -> &str {
        &self.note.nullifier
    }

    /// Hex-encoded note secret
    pub fn secret(&self) -> &str {
        &self.note.secret
    }

    /// Hex-encoded commitment the proof is anchored to
    pub fn commitment(&self) -> &str {
        &self.note.commitment
    }
}

/// Selects and reserves deposit notes for withdrawal
pub struct WithdrawalResolver {
    tracker: Arc<LifecycleTracker>,
}

impl WithdrawalResolver {
    pub fn new(tracker: Arc<LifecycleTracker>) -> Self {
        Self { tracker }
    }

    /// Select the oldest withdrawable note in a bucket and mark it spent.
    ///
    /// Returns `Ok(None)` when no eligible note exists; the caller
    /// recovers by depositing fresh funds, this is not a pool failure.
    pub async fn select_withdrawable(
        &self,
        bucket: &Bucket,
    ) -> Result<Option<WithdrawalCandidate>, TrackerError> {
        let lock = self.tracker.bucket_lock(bucket).await;
        let _guard = lock.lock().await;

        let store = self.tracker.store();
        let notes = store.notes_in_bucket(bucket).await?;

        let Some(mut note) = notes.into_iter().find(|n| n.is_withdrawable()) else {
            return Ok(None);
        };

        note.mark_spent()?;
        store.update_note(&note).await?;

        info!(
            bucket = %bucket,
            index = note.index,
            "note reserved for withdrawal"
        );

        Ok(Some(WithdrawalCandidate { note }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use crate::config::PoolConfig;
    use crate::deposit::types::DepositStatus;
    use crate::derivation::{NoteDeriver, SeedKeyDeriver};
    use crate::registry::{Currency, CurrencyAmountPair, PoolNetwork};
    use crate::storage::{MemoryNoteStore, NoteStore};

    fn eth_bucket() -> Bucket {
        let pair = CurrencyAmountPair::new(Currency::Eth, "1").unwrap();
        Bucket::new(PoolNetwork::Mainnet, pair).unwrap()
    }

    fn confirmed_note(index: u64) -> DepositNote {
        let mut note = NoteDeriver::new(Arc::new(SeedKeyDeriver::new([9u8; 32])))
            .derive_note(&eth_bucket(), index)
            .unwrap();
        note.mark_broadcast(format!("0xtx{}", index)).unwrap();
        note.record_inclusion(100);
        note.mark_confirmed().unwrap();
        note
    }

    fn pending_note(index: u64) -> DepositNote {
        let mut note = NoteDeriver::new(Arc::new(SeedKeyDeriver::new([9u8; 32])))
            .derive_note(&eth_bucket(), index)
            .unwrap();
        note.mark_broadcast(format!("0xtx{}", index)).unwrap();
        note
    }

    async fn resolver_with(notes: Vec<DepositNote>) -> WithdrawalResolver {
        let store = Arc::new(MemoryNoteStore::new());
        for note in &notes {
            store.insert_note(note).await.unwrap();
        }
        let tracker = Arc::new(
            LifecycleTracker::new(PoolConfig::default(), store)
                .with_client(PoolNetwork::Mainnet, Arc::new(MockChainClient::new())),
        );
        WithdrawalResolver::new(tracker)
    }

    #[tokio::test]
    async fn test_selects_oldest_confirmed_unspent() {
        // index 0 confirmed/unspent, index 1 pending
        let resolver = resolver_with(vec![confirmed_note(0), pending_note(1)]).await;

        let candidate = resolver
            .select_withdrawable(&eth_bucket())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.note.index, 0);
        assert!(candidate.note.spent);

        // the only eligible note is spent now
        let second = resolver.select_withdrawable(&eth_bucket()).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_oldest_first_ordering() {
        let resolver = resolver_with(vec![
            confirmed_note(2),
            confirmed_note(5),
            confirmed_note(9),
        ])
        .await;

        let first = resolver
            .select_withdrawable(&eth_bucket())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.note.index, 2);

        let second = resolver
            .select_withdrawable(&eth_bucket())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.note.index, 5);
    }

    #[tokio::test]
    async fn test_empty_bucket_is_not_found() {
        let resolver = resolver_with(vec![]).await;
        let result = resolver.select_withdrawable(&eth_bucket()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_selection_yields_one_winner() {
        // one eligible note, two racing callers: exactly one wins
        let resolver = Arc::new(resolver_with(vec![confirmed_note(0)]).await);

        let a = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.select_withdrawable(&eth_bucket()).await })
        };
        let b = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.select_withdrawable(&eth_bucket()).await })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        let winners = [a.is_some(), b.is_some()];
        assert_eq!(winners.iter().filter(|w| **w).count(), 1);
    }

    #[tokio::test]
    async fn test_candidate_exposes_proof_material() {
        let resolver = resolver_with(vec![confirmed_note(0)]).await;
        let candidate = resolver
            .select_withdrawable(&eth_bucket())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(candidate.nullifier().len(), 64);
        assert_eq!(candidate.secret().len(), 64);
        assert_eq!(candidate.commitment().len(), 64);

        // spent flag is durably recorded
        let note = resolver
            .tracker
            .store()
            .get_note(&eth_bucket(), 0)
            .await
            .unwrap()
            .unwrap();
        assert!(note.spent);
        assert_eq!(note.status, DepositStatus::Confirmed);
    }
}
