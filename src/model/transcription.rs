//! Transcription rows and the value types used to create or change them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::sentence::SentenceId;
use crate::script::ScriptTag;

/// Primary key of a transcription row.
pub type TranscriptionId = u64;

/// Primary key of a user account.
pub type UserId = u64;

// ---------------------------------------------------------------------------
// TranscriptionKind
// ---------------------------------------------------------------------------

/// Classification of a transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionKind {
    /// The same language written in another script (kana, traditional Han,
    /// Cyrillic Uzbek …).
    Altscript,
    /// A phonetic romanisation (pinyin, jyutping).
    Transcription,
}

impl Default for TranscriptionKind {
    fn default() -> Self {
        Self::Altscript
    }
}

// ---------------------------------------------------------------------------
// Transcription
// ---------------------------------------------------------------------------

/// One rendering of a sentence in a specific script.
///
/// Ownership and review state:
///
/// | `user_id` | `needs_review` | Meaning                                  |
/// |-----------|----------------|------------------------------------------|
/// | `None`    | `true`         | machine-generated, awaiting a human      |
/// | `Some(_)` | `false`        | written or confirmed by that user        |
/// | any       | any            | `readonly = true`: canonical, never edited |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    /// `None` until the row has been stored.
    pub id: Option<TranscriptionId>,
    pub sentence_id: SentenceId,
    pub script: ScriptTag,
    pub text: String,
    pub user_id: Option<UserId>,
    pub readonly: bool,
    pub needs_review: bool,
    #[serde(rename = "type")]
    pub kind: TranscriptionKind,
    /// Digest of the sentence text this row was generated from.  Only set
    /// for converter output.
    #[serde(default)]
    pub source_digest: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Transcription {
    /// `true` when a user wrote or confirmed the text.
    pub fn is_user_provided(&self) -> bool {
        self.user_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// TranscriptionInput
// ---------------------------------------------------------------------------

/// A transcription as submitted through the save path.
///
/// Every field is optional so that missing values can be reported back to
/// the submitter field by field.  `id` selects update over create.
/// Timestamps are not part of the input; the engine always sets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionInput {
    #[serde(default)]
    pub id: Option<TranscriptionId>,
    #[serde(default)]
    pub sentence_id: Option<SentenceId>,
    /// Raw script tag; parsed against [`ScriptTag`] during validation.
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl TranscriptionInput {
    /// Input for a brand new row.
    pub fn create(sentence_id: SentenceId, script: &str, text: &str) -> Self {
        Self {
            id: None,
            sentence_id: Some(sentence_id),
            script: Some(script.to_string()),
            text: Some(text.to_string()),
        }
    }

    /// Input that edits the text of an existing row.
    pub fn edit(id: TranscriptionId, text: &str) -> Self {
        Self {
            id: Some(id),
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Rebuild the input a client would send back for `row`.
    pub fn from_row(row: &Transcription) -> Self {
        Self {
            id: row.id,
            sentence_id: Some(row.sentence_id),
            script: Some(row.script.to_string()),
            text: Some(row.text.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionSeed
// ---------------------------------------------------------------------------

/// Overrides passed to [`generate_transcription`].
///
/// * `id` — update that row in place instead of inserting.
/// * `text` — use this text instead of calling the converter.
/// * `user_id` — the text was provided by this user.
/// * `modified` — only overwrite `id` if it still carries this timestamp.
///
/// [`generate_transcription`]: crate::reconcile::TranscriptionReconciler::generate_transcription
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptionSeed {
    pub id: Option<TranscriptionId>,
    pub text: Option<String>,
    pub user_id: Option<UserId>,
    pub modified: Option<DateTime<Utc>>,
}

impl TranscriptionSeed {
    /// Regenerate the row `id` from the converter.
    pub fn existing(id: TranscriptionId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Regenerate `row` from the converter, unless it is written to in the
    /// meantime.
    pub fn refresh(row: &Transcription) -> Self {
        Self {
            id: row.id,
            modified: Some(row.modified),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionPatch
// ---------------------------------------------------------------------------

/// The mutable columns of a stored transcription.
///
/// `sentence_id` and `script` are absent: they never change
/// after creation.  `None` leaves a column untouched.
///
/// With `if_modified` set, the store refuses the patch when the row's
/// `modified` differs, so a write that landed after the caller read the
/// row is never overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionPatch {
    pub text: Option<String>,
    pub user_id: Option<Option<UserId>>,
    pub needs_review: Option<bool>,
    pub kind: Option<TranscriptionKind>,
    pub source_digest: Option<Option<String>>,
    pub modified: DateTime<Utc>,
    pub if_modified: Option<DateTime<Utc>>,
}

impl TranscriptionPatch {
    /// An empty patch that only bumps `modified`.
    pub fn touch(modified: DateTime<Utc>) -> Self {
        Self {
            text: None,
            user_id: None,
            needs_review: None,
            kind: None,
            source_digest: None,
            modified,
            if_modified: None,
        }
    }

    /// Apply the patch to `row` in place.
    pub fn apply(&self, row: &mut Transcription) {
        if let Some(text) = &self.text {
            row.text = text.clone();
        }
        if let Some(user_id) = self.user_id {
            row.user_id = user_id;
        }
        if let Some(needs_review) = self.needs_review {
            row.needs_review = needs_review;
        }
        if let Some(kind) = self.kind {
            row.kind = kind;
        }
        if let Some(digest) = &self.source_digest {
            row.source_digest = digest.clone();
        }
        row.modified = self.modified;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
