//! Storage Trait Definitions
//!
//! Abstract note/cursor persistence keyed by bucket. The deposit manager
//! treats the store as the single shared mutable resource: all mutation
//! goes through whole-note (or whole-cursor) writes, so a transition
//! either fully applies or not at all.

use async_trait::async_trait;
use thiserror::Error;

use crate::deposit::types::{DepositNote, DepositStatus, DerivationCursor};
use crate::registry::Bucket;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("note not found: {0}")]
    NotFound(String),

    #[error("duplicate note: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Note/cursor storage interface
///
/// Implementations:
/// - `MemoryNoteStore` - in-memory storage for tests and ephemeral use
/// - wallets provide a durable implementation over their own key-value
///   engine
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Insert a newly derived note. Fails on a duplicate (bucket, index).
    async fn insert_note(&self, note: &DepositNote) -> StorageResult<()>;

    /// Replace an existing note in a single write
    async fn update_note(&self, note: &DepositNote) -> StorageResult<()>;

    /// Get a note by bucket and index
    async fn get_note(&self, bucket: &Bucket, index: u64) -> StorageResult<Option<DepositNote>>;

    /// All notes in a bucket, ordered by index
    async fn notes_in_bucket(&self, bucket: &Bucket) -> StorageResult<Vec<DepositNote>>;

    /// Notes in a bucket with a specific status, ordered by index
    async fn notes_by_status(
        &self,
        bucket: &Bucket,
        status: DepositStatus,
    ) -> StorageResult<Vec<DepositNote>>;

    /// The bucket's derivation cursor (default if never written)
    async fn cursor(&self, bucket: &Bucket) -> StorageResult<DerivationCursor>;

    /// Replace the bucket's derivation cursor
    async fn set_cursor(&self, bucket: &Bucket, cursor: DerivationCursor) -> StorageResult<()>;

    /// All buckets with recorded state
    async fn buckets(&self) -> StorageResult<Vec<Bucket>>;
}
