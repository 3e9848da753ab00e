//! Durable storage for sentences and transcriptions.
//!
//! The engine talks to storage only through two traits:
//!
//! * [`TranscriptionStore`] — keyed transcription rows with an atomic
//!   insert-if-absent on `(sentence_id, script)`.
//! * [`SentenceLookup`] — read-only access to parent sentences.
//!
//! Two implementations ship with the crate: [`MemoryStore`] and the
//! JSON-snapshot [`FileStore`].

pub mod file;
pub mod memory;

use thiserror::Error;

use crate::model::{Sentence, SentenceId, Transcription, TranscriptionId, TranscriptionPatch};
use crate::script::ScriptTag;

pub use file::FileStore;
pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row for `(sentence_id, script)` already exists.
    #[error("a {script} transcription already exists for sentence {sentence_id}")]
    Duplicate {
        sentence_id: SentenceId,
        script: ScriptTag,
    },

    /// No transcription row has this id.
    #[error("transcription {0} not found")]
    NotFound(TranscriptionId),

    /// The row changed after the caller read it (`if_modified` mismatch).
    #[error("transcription {0} changed since it was read")]
    Conflict(TranscriptionId),

    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file could not be (de)serialised.
    #[error("store snapshot is corrupt: {0}")]
    Serde(#[from] serde_json::Error),

    /// A lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Keyed storage for transcription rows.
///
/// # Contract
///
/// - `insert` assigns the id and must fail with [`StoreError::Duplicate`]
///   atomically when `(sentence_id, script)` is taken, so that two
///   concurrent sweeps cannot both create the row.
/// - `update` never changes `sentence_id` or `script`, and must fail with
///   [`StoreError::Conflict`] atomically when `patch.if_modified` is set and
///   differs from the row's `modified`.
/// - A failed write leaves the store as it was.
/// - `find_by_sentence` returns rows in id order.
pub trait TranscriptionStore: Send + Sync {
    fn find_by_id(&self, id: TranscriptionId) -> Result<Option<Transcription>, StoreError>;

    fn find_by_sentence(&self, sentence_id: SentenceId) -> Result<Vec<Transcription>, StoreError>;

    fn find_one(
        &self,
        sentence_id: SentenceId,
        script: ScriptTag,
    ) -> Result<Option<Transcription>, StoreError>;

    fn insert(&self, transcription: Transcription) -> Result<Transcription, StoreError>;

    fn update(&self, id: TranscriptionId, patch: &TranscriptionPatch) -> Result<Transcription, StoreError>;

    /// Total number of transcription rows.
    fn count(&self) -> Result<usize, StoreError>;
}

/// Read access to parent sentences.
pub trait SentenceLookup: Send + Sync {
    fn find_sentence(&self, id: SentenceId) -> Result<Option<Sentence>, StoreError>;
}

// Compile-time assertion: both traits must stay object-safe.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TranscriptionStore>, _: Box<dyn SentenceLookup>) {}
};
