//! Transcription reconciliation.
//!
//! # Data flow
//!
//! ```text
//! Sentence ──▶ TranscriptionPolicy ──(required scripts)──┐
//!                                                         ▼
//!                         ┌──────────────────────────────────────────┐
//!                         │         TranscriptionReconciler          │
//!   TranscriptionInput ──▶│  save_transcription   (user/system save) │
//!                         │  generate_and_save_all_transcriptions_for│
//!                         │  add_generated_transcriptions (display)  │
//!                         └───────┬───────────────────────┬──────────┘
//!                                 │ generate / validate   │ insert / update
//!                                 ▼                       ▼
//!                         ConverterRegistry       TranscriptionStore
//! ```

pub mod error;
pub mod reconciler;

pub use error::{ReconcileError, Rejection, RejectionKind};
pub use reconciler::TranscriptionReconciler;
