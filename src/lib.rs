//! altscript — alternate-script transcriptions for multilingual sentences.
//!
//! A sentence in Japanese gets a furigana reading, a Mandarin sentence its
//! traditional/simplified counterpart and pinyin, and so on.  This crate
//! decides which of those a sentence needs, generates them through external
//! converters, and keeps them in step with edits without clobbering what
//! users wrote.
//!
//! | Module        | Role                                                  |
//! |---------------|-------------------------------------------------------|
//! | [`script`]    | `ScriptTag`, the closed set of ISO 15924 codes        |
//! | [`model`]     | `Sentence`, `Transcription` and save/patch inputs     |
//! | [`policy`]    | Rule table and the predicates built on it             |
//! | [`convert`]   | Converter/detector traits, registry, HTTP adapters    |
//! | [`store`]     | Storage traits, in-memory and JSON-file stores        |
//! | [`reconcile`] | `TranscriptionReconciler`, the engine                 |
//! | [`config`]    | `AppConfig` (TOML) and platform paths                 |

pub mod config;
pub mod convert;
pub mod model;
pub mod policy;
pub mod reconcile;
pub mod script;
pub mod store;
