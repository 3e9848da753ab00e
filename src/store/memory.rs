//! In-memory store.
//!
//! All state sits behind a single [`Mutex`], which makes `insert` an atomic
//! check-and-insert on `(sentence_id, script)`.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::model::{Sentence, SentenceId, Transcription, TranscriptionId, TranscriptionPatch};
use crate::script::ScriptTag;
use crate::store::{SentenceLookup, StoreError, TranscriptionStore};

/// Plain data held by a [`MemoryStore`]; also the on-disk layout of a
/// [`FileStore`](super::FileStore) snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub sentences: BTreeMap<SentenceId, Sentence>,
    #[serde(default)]
    pub transcriptions: BTreeMap<TranscriptionId, Transcription>,
}

impl Snapshot {
    fn next_id(&self) -> TranscriptionId {
        self.transcriptions.keys().next_back().map_or(1, |id| id + 1)
    }

    fn find_one(&self, sentence_id: SentenceId, script: ScriptTag) -> Option<&Transcription> {
        self.transcriptions
            .values()
            .find(|t| t.sentence_id == sentence_id && t.script == script)
    }
}

/// Thread-safe in-memory [`TranscriptionStore`] + [`SentenceLookup`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    /// Add or replace a sentence.
    pub fn put_sentence(&self, sentence: Sentence) -> Result<(), StoreError> {
        self.lock()?.sentences.insert(sentence.id, sentence);
        Ok(())
    }

    /// All sentences, in id order.
    pub fn sentences(&self) -> Result<Vec<Sentence>, StoreError> {
        Ok(self.lock()?.sentences.values().cloned().collect())
    }

    /// Replace the whole state with `snapshot`.
    pub fn restore(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        *self.lock()? = snapshot;
        Ok(())
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl TranscriptionStore for MemoryStore {
    fn find_by_id(&self, id: TranscriptionId) -> Result<Option<Transcription>, StoreError> {
        Ok(self.lock()?.transcriptions.get(&id).cloned())
    }

    fn find_by_sentence(&self, sentence_id: SentenceId) -> Result<Vec<Transcription>, StoreError> {
        Ok(self
            .lock()?
            .transcriptions
            .values()
            .filter(|t| t.sentence_id == sentence_id)
            .cloned()
            .collect())
    }

    fn find_one(
        &self,
        sentence_id: SentenceId,
        script: ScriptTag,
    ) -> Result<Option<Transcription>, StoreError> {
        Ok(self.lock()?.find_one(sentence_id, script).cloned())
    }

    fn insert(&self, mut transcription: Transcription) -> Result<Transcription, StoreError> {
        let mut state = self.lock()?;
        if state
            .find_one(transcription.sentence_id, transcription.script)
            .is_some()
        {
            return Err(StoreError::Duplicate {
                sentence_id: transcription.sentence_id,
                script: transcription.script,
            });
        }
        let id = state.next_id();
        transcription.id = Some(id);
        state.transcriptions.insert(id, transcription.clone());
        Ok(transcription)
    }

    fn update(&self, id: TranscriptionId, patch: &TranscriptionPatch) -> Result<Transcription, StoreError> {
        let mut state = self.lock()?;
        let row = state
            .transcriptions
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        if patch.if_modified.is_some_and(|seen| seen != row.modified) {
            return Err(StoreError::Conflict(id));
        }
        patch.apply(row);
        Ok(row.clone())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.transcriptions.len())
    }
}

impl SentenceLookup for MemoryStore {
    fn find_sentence(&self, id: SentenceId) -> Result<Option<Sentence>, StoreError> {
        Ok(self.lock()?.sentences.get(&id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
