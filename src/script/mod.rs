//! Writing-system tags.
//!
//! [`ScriptTag`] is the closed set of ISO 15924 codes a transcription may be
//! written in.  Anything outside the set is rejected at parse time with
//! [`UnknownScript`].

pub mod tag;

pub use tag::{ScriptTag, UnknownScript};
