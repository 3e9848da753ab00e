//! Transcription policy — which scripts a sentence gets, and when.
//!
//! Everything here is pure: no store, no converter, no clock.
//!
//! * [`ScriptRule`] — one allowed `(language, source script) → target` pair,
//!   with its read-only flag and [`TranscriptionKind`].
//! * [`builtin_rules`] — the table used when configuration supplies none.
//! * [`TranscriptionPolicy`] — lookups and predicates over a rule table.
//!
//! [`TranscriptionKind`]: crate::model::TranscriptionKind

pub mod rules;
pub mod table;

pub use rules::TranscriptionPolicy;
pub use table::{builtin_rules, ScriptRule};
