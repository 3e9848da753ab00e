//! The rule table behind [`TranscriptionPolicy`](super::TranscriptionPolicy).

use serde::{Deserialize, Serialize};

use crate::model::TranscriptionKind;
use crate::script::ScriptTag;

/// One permitted transcription direction.
///
/// Rules for the same `(language, source)` are kept in table order; that
/// order is the canonical script order for the language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRule {
    /// ISO 639-3 code of the sentence language.
    pub language: String,
    /// Script the sentence is written in.
    pub source: ScriptTag,
    /// Script of the transcription.
    pub target: ScriptTag,
    /// Canonical conversion: generated once, never edited by users.
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub kind: TranscriptionKind,
}

impl ScriptRule {
    pub fn new(language: &str, source: ScriptTag, target: ScriptTag) -> Self {
        Self {
            language: language.to_string(),
            source,
            target,
            readonly: false,
            kind: TranscriptionKind::Altscript,
        }
    }

    /// `true` for sentences in `lang` written in `source`.
    pub fn applies_to(&self, lang: Option<&str>, source: Option<ScriptTag>) -> bool {
        lang == Some(self.language.as_str()) && source == Some(self.source)
    }

    /// Mark the rule as producing read-only rows.
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Mark the rule as a romanisation.
    pub fn romanisation(mut self) -> Self {
        self.kind = TranscriptionKind::Transcription;
        self
    }
}

/// Built-in table.
///
/// | Language | Source | Targets                               |
/// |----------|--------|---------------------------------------|
/// | `jpn`    | `Jpan` | `Hrkt` (furigana)                     |
/// | `cmn`    | `Hans` | `Hant` (read-only), `Latn` (pinyin)   |
/// | `cmn`    | `Hant` | `Hans` (read-only), `Latn` (pinyin)   |
/// | `yue`    | `Hant` | `Latn` (jyutping)                     |
/// | `uzb`    | `Latn` | `Cyrl`                                |
/// | `uzb`    | `Cyrl` | `Latn`                                |
pub fn builtin_rules() -> Vec<ScriptRule> {
    use ScriptTag::*;

    vec![
        ScriptRule::new("jpn", Jpan, Hrkt),
        ScriptRule::new("cmn", Hans, Hant).readonly(),
        ScriptRule::new("cmn", Hans, Latn).romanisation(),
        ScriptRule::new("cmn", Hant, Hans).readonly(),
        ScriptRule::new("cmn", Hant, Latn).romanisation(),
        ScriptRule::new("yue", Hant, Latn).romanisation(),
        ScriptRule::new("uzb", Latn, Cyrl),
        ScriptRule::new("uzb", Cyrl, Latn),
    ]
}
