//! Converter traits, the pair key, and error type.
//!
//! # Overview
//!
//! [`PairConverter`] turns a sentence text in one script into another script
//! for one language.  [`ScriptDetector`] tells which script an
//! ambiguous-script language (Chinese, Uzbek) was written in.  Both are
//! object-safe and `Send + Sync` so they can sit behind `Arc<dyn …>` in the
//! [`ConverterRegistry`](super::ConverterRegistry).
//!
//! [`MockConverter`] and [`MockDetector`] (available under `#[cfg(test)]`)
//! return canned answers and count their calls.

use std::fmt;

use thiserror::Error;

use crate::script::ScriptTag;

// ---------------------------------------------------------------------------
// ConvertError
// ---------------------------------------------------------------------------

/// All errors that can arise from a conversion backend.
#[derive(Debug, Clone, Error)]
pub enum ConvertError {
    /// No converter is registered for the pair.
    #[error("no converter registered for {0}")]
    NoConverter(ScriptPair),

    /// No script detector is registered for the language.
    #[error("no script detector registered for language {0:?}")]
    NoDetector(String),

    /// Transport or connection error talking to the conversion service.
    #[error("converter request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("converter request timed out")]
    Timeout,

    /// The backend answered with something that could not be understood.
    #[error("failed to parse converter response: {0}")]
    Parse(String),

    /// The backend produced no text.
    #[error("converter returned an empty result")]
    EmptyResult,
}

impl From<reqwest::Error> for ConvertError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ConvertError::Timeout
        } else {
            ConvertError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptPair
// ---------------------------------------------------------------------------

/// Registry key: one conversion direction for one language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptPair {
    pub language: String,
    pub source: ScriptTag,
    pub target: ScriptTag,
}

impl ScriptPair {
    pub fn new(language: &str, source: ScriptTag, target: ScriptTag) -> Self {
        Self {
            language: language.to_string(),
            source,
            target,
        }
    }
}

impl fmt::Display for ScriptPair {
    /// Formats as `jpn_Jpan_to_Hrkt`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_to_{}", self.language, self.source, self.target)
    }
}

// ---------------------------------------------------------------------------
// Generated
// ---------------------------------------------------------------------------

/// Converter output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    /// `false` when the backend is certain of its output (no ambiguous
    /// readings) and a human need not confirm it.
    pub needs_review: bool,
}

impl Generated {
    /// Output that still needs a human to confirm it.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            needs_review: true,
        }
    }

    /// Output the backend vouches for.
    pub fn certain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            needs_review: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Generator/validator for one [`ScriptPair`].
pub trait PairConverter: Send + Sync {
    /// Render `text` in the target script.
    fn generate(&self, text: &str) -> Result<Generated, ConvertError>;

    /// Check that `text` is acceptable in the target script.
    ///
    /// `user_provided` is `true` when a person typed the text.  Backends
    /// without a validator accept everything.
    fn validate(&self, _text: &str, _user_provided: bool) -> Result<bool, ConvertError> {
        Ok(true)
    }
}

/// Guesses the script of a text in an ambiguous-script language.
pub trait ScriptDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<ScriptTag, ConvertError>;
}

// Compile-time assertion: both traits must stay object-safe.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn PairConverter>, _: Box<dyn ScriptDetector>) {}
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured result and counts calls.
#[cfg(test)]
pub struct MockConverter {
    output: Result<Generated, ConvertError>,
    valid: bool,
    pub generate_calls: std::sync::atomic::AtomicUsize,
    pub validate_calls: std::sync::atomic::AtomicUsize,
    pub seen: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockConverter {
    /// Always generates `Generated::new(text)` and accepts everything.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            output: Ok(Generated::new(text)),
            valid: true,
            generate_calls: Default::default(),
            validate_calls: Default::default(),
            seen: Default::default(),
        }
    }

    /// Always fails generation with `error`.
    pub fn err(error: ConvertError) -> Self {
        Self {
            output: Err(error),
            ..Self::ok("")
        }
    }

    /// Always generates output the backend is certain about.
    pub fn certain(text: impl Into<String>) -> Self {
        Self {
            output: Ok(Generated::certain(text)),
            ..Self::ok("")
        }
    }

    /// Reject everything passed to `validate`.
    pub fn rejecting(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn generated(&self) -> usize {
        self.generate_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn validated(&self) -> usize {
        self.validate_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl PairConverter for MockConverter {
    fn generate(&self, text: &str) -> Result<Generated, ConvertError> {
        self.generate_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());
        self.output.clone()
    }

    fn validate(&self, _text: &str, _user_provided: bool) -> Result<bool, ConvertError> {
        self.validate_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.valid)
    }
}

/// A detector that always answers with the same script.
#[cfg(test)]
pub struct MockDetector {
    script: ScriptTag,
    pub seen: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockDetector {
    pub fn answering(script: ScriptTag) -> Self {
        Self {
            script,
            seen: Default::default(),
        }
    }
}

#[cfg(test)]
impl ScriptDetector for MockDetector {
    fn detect(&self, text: &str) -> Result<ScriptTag, ConvertError> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(self.script)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
