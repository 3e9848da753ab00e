//! The source sentence a transcription is derived from.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::script::ScriptTag;

/// Primary key of a sentence row.
pub type SentenceId = u64;

/// A corpus sentence.
///
/// The engine never edits a sentence; it only reacts to the current
/// `lang`, `script` and `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub id: SentenceId,
    /// ISO 639-3 language code (`"jpn"`, `"cmn"` …).  `None` when the
    /// contributor did not set a language.
    pub lang: Option<String>,
    /// Script the text is written in.  `None` for languages written in a
    /// single script, where the policy supplies the default.
    #[serde(default)]
    pub script: Option<ScriptTag>,
    pub text: String,
}

impl Sentence {
    pub fn new(id: SentenceId, lang: &str, script: Option<ScriptTag>, text: &str) -> Self {
        Self {
            id,
            lang: Some(lang.to_string()),
            script,
            text: text.to_string(),
        }
    }

    /// Lower-case hex SHA-256 of `text`.
    ///
    /// Generated transcriptions remember the digest of the text they were
    /// produced from; a mismatch marks them stale.
    pub fn text_digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.text.as_bytes()))
    }
}
