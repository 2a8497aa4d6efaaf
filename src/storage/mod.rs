//! Note/cursor persistence
//!
//! The store is consumed as a key-value interface keyed by bucket; the
//! engine behind it is the embedding wallet's concern.

pub mod memory;
pub mod traits;

pub use memory::MemoryNoteStore;
pub use traits::{NoteStore, StorageError, StorageResult};
