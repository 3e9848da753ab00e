//! Corpus data model: sentences and their transcriptions.
//!
//! * [`Sentence`] — the read-only source row a transcription renders.
//! * [`Transcription`] — one rendering of a sentence in one script.
//! * [`TranscriptionInput`] — loosely-typed user submission, validated by
//!   the reconciler before anything reaches the store.
//! * [`TranscriptionSeed`] — caller-supplied overrides for generation.
//! * [`TranscriptionPatch`] — the mutable subset of a stored row.

pub mod sentence;
pub mod transcription;

pub use sentence::{Sentence, SentenceId};
pub use transcription::{
    Transcription, TranscriptionId, TranscriptionInput, TranscriptionKind, TranscriptionPatch,
    TranscriptionSeed, UserId,
};
