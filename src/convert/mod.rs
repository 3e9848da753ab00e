//! Script conversion capability.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    ConverterRegistry                      │
//! │                                                           │
//! │  ScriptPair(jpn, Jpan → Hrkt) ──▶ Arc<dyn PairConverter>  │
//! │  ScriptPair(cmn, Hans → Latn) ──▶ Arc<dyn PairConverter>  │
//! │  "cmn"                        ──▶ Arc<dyn ScriptDetector> │
//! └───────────────────────────────────────────────────────────┘
//!                │ production
//!                ▼
//!        HttpConverter / HttpDetector  (external service)
//! ```
//!
//! The conversion algorithms themselves (kanji → kana, simplified →
//! traditional, romanisers) live outside this crate.

pub mod converter;
pub mod http;
pub mod registry;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use converter::{ConvertError, Generated, PairConverter, ScriptDetector, ScriptPair};
pub use http::{HttpConverter, HttpDetector};
pub use registry::ConverterRegistry;

#[cfg(test)]
pub use converter::{MockConverter, MockDetector};
