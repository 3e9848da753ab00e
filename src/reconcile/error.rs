//! Rejections and errors surfaced by the reconciler.

use thiserror::Error;

use crate::convert::ConvertError;
use crate::store::StoreError;

// ---------------------------------------------------------------------------
// Rejection
// ---------------------------------------------------------------------------

/// Why a single row was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// A required field is missing or content failed script validation.
    Validation,
    /// Disallowed script pair, immutable field change, or read-only row.
    Policy,
    /// The parent sentence or the row being edited does not exist.
    NotFound,
    /// A transcription in that script already exists for the sentence.
    Duplicate,
}

/// A field-keyed refusal that the caller shows to the end user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct Rejection {
    /// Name of the offending input field (`"script"`, `"text"` …).
    pub field: &'static str,
    pub kind: RejectionKind,
    pub message: String,
}

impl Rejection {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::new(field, RejectionKind::Validation, message)
    }

    pub fn policy(field: &'static str, message: impl Into<String>) -> Self {
        Self::new(field, RejectionKind::Policy, message)
    }

    pub fn not_found(field: &'static str, message: impl Into<String>) -> Self {
        Self::new(field, RejectionKind::NotFound, message)
    }

    pub fn duplicate(field: &'static str, message: impl Into<String>) -> Self {
        Self::new(field, RejectionKind::Duplicate, message)
    }

    fn new(field: &'static str, kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            field,
            kind,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReconcileError
// ---------------------------------------------------------------------------

/// Errors returned by [`TranscriptionReconciler`](super::TranscriptionReconciler).
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The row was refused; nothing was written.
    #[error("transcription rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

impl ReconcileError {
    /// The rejection, if this error is one.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ReconcileError::Rejected(r) => Some(r),
            _ => None,
        }
    }

    /// `true` when the failure only concerns the one script being written,
    /// so a sweep can carry on with the others.
    ///
    /// Storage failures other than a lost insert/update race or a row
    /// changed under the caller are not local.
    pub fn is_local(&self) -> bool {
        match self {
            ReconcileError::Rejected(_) | ReconcileError::Convert(_) => true,
            ReconcileError::Store(
                StoreError::Duplicate { .. } | StoreError::NotFound(_) | StoreError::Conflict(_),
            ) => true,
            ReconcileError::Store(_) => false,
        }
    }
}
