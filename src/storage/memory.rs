//! In-Memory Note Store
//!
//! Thread-safe in-memory implementation of [`NoteStore`], used by tests
//! and as the ephemeral store before a wallet wires in its own key-value
//! engine. Data is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::traits::{NoteStore, StorageError, StorageResult};
use crate::deposit::types::{BucketState, DepositNote, DepositStatus, DerivationCursor};
use crate::registry::Bucket;

/// In-memory bucket-keyed note store
#[derive(Clone, Default)]
pub struct MemoryNoteStore {
    buckets: Arc<RwLock<HashMap<Bucket, BucketState>>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn note_key(bucket: &Bucket, index: u64) -> String {
    format!("{}#{}", bucket, index)
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn insert_note(&self, note: &DepositNote) -> StorageResult<()> {
        let mut buckets = self.buckets.write().await;
        let state = buckets.entry(note.bucket.clone()).or_default();

        if state.notes.contains_key(&note.index) {
            return Err(StorageError::Duplicate(note_key(&note.bucket, note.index)));
        }

        state.notes.insert(note.index, note.clone());
        Ok(())
    }

    async fn update_note(&self, note: &DepositNote) -> StorageResult<()> {
        let mut buckets = self.buckets.write().await;
        let state = buckets
            .get_mut(&note.bucket)
            .ok_or_else(|| StorageError::NotFound(note_key(&note.bucket, note.index)))?;

        if !state.notes.contains_key(&note.index) {
            return Err(StorageError::NotFound(note_key(&note.bucket, note.index)));
        }

        state.notes.insert(note.index, note.clone());
        Ok(())
    }

    async fn get_note(&self, bucket: &Bucket, index: u64) -> StorageResult<Option<DepositNote>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .and_then(|state| state.notes.get(&index))
            .cloned())
    }

    async fn notes_in_bucket(&self, bucket: &Bucket) -> StorageResult<Vec<DepositNote>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .map(|state| state.notes.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn notes_by_status(
        &self,
        bucket: &Bucket,
        status: DepositStatus,
    ) -> StorageResult<Vec<DepositNote>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .map(|state| {
                state
                    .notes
                    .values()
                    .filter(|n| n.status == status)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn cursor(&self, bucket: &Bucket) -> StorageResult<DerivationCursor> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .map(|state| state.cursor)
            .unwrap_or_default())
    }

    async fn set_cursor(&self, bucket: &Bucket, cursor: DerivationCursor) -> StorageResult<()> {
        let mut buckets = self.buckets.write().await;
        buckets.entry(bucket.clone()).or_default().cursor = cursor;
        Ok(())
    }

    async fn buckets(&self) -> StorageResult<Vec<Bucket>> {
        let buckets = self.buckets.read().await;
        Ok(buckets.keys().cloned().collect())
    }
}
