//! JSON-file-backed store.
//!
//! [`FileStore`] keeps a [`MemoryStore`] in memory and writes the whole
//! snapshot back to disk after every successful write, so rows survive
//! restarts.  A write whose snapshot cannot be saved is undone in memory
//! too.  The file layout is:
//!
//! ```json
//! { "sentences": { "6": { … } }, "transcriptions": { "1": { … } } }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::model::{Sentence, SentenceId, Transcription, TranscriptionId, TranscriptionPatch};
use crate::script::ScriptTag;
use crate::store::memory::{MemoryStore, Snapshot};
use crate::store::{SentenceLookup, StoreError, TranscriptionStore};

/// A [`MemoryStore`] persisted as one JSON file.
#[derive(Debug)]
pub struct FileStore {
    inner: MemoryStore,
    path: PathBuf,
    // Held from the in-memory change until the snapshot is on disk.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store at `path`, loading the existing snapshot if there is
    /// one.  A missing file starts an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                Snapshot::default()
            } else {
                serde_json::from_str(&data)?
            }
        } else {
            Snapshot::default()
        };

        log::debug!(
            "file store opened at {} ({} sentences, {} transcriptions)",
            path.display(),
            snapshot.sentences.len(),
            snapshot.transcriptions.len()
        );

        Ok(Self {
            inner: MemoryStore::from_snapshot(snapshot),
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add or replace a sentence and persist.
    pub fn put_sentence(&self, sentence: Sentence) -> Result<(), StoreError> {
        self.write(|inner| inner.put_sentence(sentence))
    }

    /// All sentences, in id order.
    pub fn sentences(&self) -> Result<Vec<Sentence>, StoreError> {
        self.inner.sentences()
    }

    /// Apply `change` to the in-memory state and persist it, restoring the
    /// previous state if the snapshot cannot be written.
    fn write<T>(
        &self,
        change: impl FnOnce(&MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let before = self.inner.snapshot()?;
        let out = change(&self.inner)?;
        if let Err(e) = self.save() {
            log::warn!("{}: write failed, change rolled back: {e}", self.path.display());
            self.inner.restore(before)?;
            return Err(e);
        }
        Ok(out)
    }

    fn save(&self) -> Result<(), StoreError> {
        let snapshot = self.inner.snapshot()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&snapshot)?;
        // Write-then-rename: the file on disk is always a complete snapshot.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TranscriptionStore for FileStore {
    fn find_by_id(&self, id: TranscriptionId) -> Result<Option<Transcription>, StoreError> {
        self.inner.find_by_id(id)
    }

    fn find_by_sentence(&self, sentence_id: SentenceId) -> Result<Vec<Transcription>, StoreError> {
        self.inner.find_by_sentence(sentence_id)
    }

    fn find_one(
        &self,
        sentence_id: SentenceId,
        script: ScriptTag,
    ) -> Result<Option<Transcription>, StoreError> {
        self.inner.find_one(sentence_id, script)
    }

    fn insert(&self, transcription: Transcription) -> Result<Transcription, StoreError> {
        self.write(|inner| inner.insert(transcription))
    }

    fn update(&self, id: TranscriptionId, patch: &TranscriptionPatch) -> Result<Transcription, StoreError> {
        self.write(|inner| inner.update(id, patch))
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.inner.count()
    }
}

impl SentenceLookup for FileStore {
    fn find_sentence(&self, id: SentenceId) -> Result<Option<Sentence>, StoreError> {
        self.inner.find_sentence(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TranscriptionKind;
    use chrono::Utc;
    use tempfile::tempdir;

    fn row(sentence_id: SentenceId) -> Transcription {
        let now = Utc::now();
        Transcription {
            id: None,
            sentence_id,
            script: ScriptTag::Hrkt,
            text: "きょう".into(),
            user_id: None,
            readonly: false,
            needs_review: true,
            kind: TranscriptionKind::Altscript,
            source_digest: Some("d".into()),
            created: now,
            modified: now,
        }
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempdir().expect("temp dir");
        let store = FileStore::open(dir.path().join("nope.json")).expect("open");
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.sentences().unwrap().is_empty());
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("transcriptions.json");

        {
            let store = FileStore::open(&path).expect("open");
            store
                .put_sentence(Sentence::new(10, "jpn", Some(ScriptTag::Jpan), "今日"))
                .unwrap();
            let id = store.insert(row(10)).unwrap().id.unwrap();
            let patch = TranscriptionPatch {
                user_id: Some(Some(4)),
                needs_review: Some(false),
                ..TranscriptionPatch::touch(Utc::now())
            };
            store.update(id, &patch).unwrap();
        }

        let reloaded = FileStore::open(&path).expect("reopen");
        assert_eq!(reloaded.count().unwrap(), 1);
        let t = reloaded.find_one(10, ScriptTag::Hrkt).unwrap().unwrap();
        assert_eq!(t.user_id, Some(4));
        assert!(!t.needs_review);
        assert_eq!(reloaded.find_sentence(10).unwrap().unwrap().text, "今日");
    }

    #[test]
    fn duplicate_insert_leaves_file_untouched() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("t.json");
        let store = FileStore::open(&path).expect("open");
        store.insert(row(1)).unwrap();
        assert!(matches!(
            store.insert(row(1)),
            Err(StoreError::Duplicate { .. })
        ));
        let reloaded = FileStore::open(&path).expect("reopen");
        assert_eq!(reloaded.count().unwrap(), 1);
    }

    #[test]
    fn failed_save_is_rolled_back_in_memory() {
        let dir = tempdir().expect("temp dir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = FileStore::open(blocker.join("t.json")).expect("open");

        assert!(matches!(store.insert(row(1)), Err(StoreError::Io(_))));
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.find_one(1, ScriptTag::Hrkt).unwrap().is_none());

        assert!(store
            .put_sentence(Sentence::new(1, "jpn", Some(ScriptTag::Jpan), "今日"))
            .is_err());
        assert!(store.sentences().unwrap().is_empty());
    }

    #[test]
    fn failed_update_keeps_the_old_row() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("store").join("t.json");
        let store = FileStore::open(&path).expect("open");
        let id = store.insert(row(1)).unwrap().id.unwrap();

        // Replace the directory with a file so the next save fails.
        std::fs::remove_dir_all(dir.path().join("store")).unwrap();
        std::fs::write(dir.path().join("store"), "").unwrap();

        let patch = TranscriptionPatch {
            text: Some("lost".into()),
            ..TranscriptionPatch::touch(Utc::now())
        };
        assert!(store.update(id, &patch).is_err());
        assert_eq!(store.find_by_id(id).unwrap().unwrap().text, "きょう");
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(StoreError::Serde(_))));
    }
}
