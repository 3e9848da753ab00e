//! [`TranscriptionPolicy`] — pure lookups and predicates over the rule table.

use crate::model::{Sentence, Transcription};
use crate::policy::table::{builtin_rules, ScriptRule};
use crate::script::ScriptTag;

/// Decides which transcriptions a sentence should have and whether an
/// existing one must be regenerated.
///
/// Cheap to clone; holds nothing but the rule table.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionPolicy {
    rules: Vec<ScriptRule>,
}

impl Default for TranscriptionPolicy {
    fn default() -> Self {
        Self::new(builtin_rules())
    }
}

impl TranscriptionPolicy {
    /// Build a policy over `rules`.  An empty list falls back to
    /// [`builtin_rules`].
    pub fn new(rules: Vec<ScriptRule>) -> Self {
        if rules.is_empty() {
            return Self {
                rules: builtin_rules(),
            };
        }
        Self { rules }
    }

    pub fn rules(&self) -> &[ScriptRule] {
        &self.rules
    }

    // -----------------------------------------------------------------------
    // Table lookups
    // -----------------------------------------------------------------------

    /// The rule for one direction, if the direction is allowed.
    pub fn rule_for(
        &self,
        lang: Option<&str>,
        source: Option<ScriptTag>,
        target: ScriptTag,
    ) -> Option<&ScriptRule> {
        self.rules
            .iter()
            .find(|r| r.applies_to(lang, source) && r.target == target)
    }

    /// Scripts a sentence in `lang`/`source` must be transcribed into, in
    /// canonical order.  Empty for languages without an alternate-script
    /// convention.
    ///
    /// ```
    /// use altscript::policy::TranscriptionPolicy;
    /// use altscript::script::ScriptTag;
    ///
    /// let policy = TranscriptionPolicy::default();
    /// assert_eq!(
    ///     policy.required_scripts(Some("cmn"), Some(ScriptTag::Hans)),
    ///     vec![ScriptTag::Hant, ScriptTag::Latn],
    /// );
    /// assert!(policy.required_scripts(Some("eng"), Some(ScriptTag::Latn)).is_empty());
    /// ```
    pub fn required_scripts(&self, lang: Option<&str>, source: Option<ScriptTag>) -> Vec<ScriptTag> {
        self.rules
            .iter()
            .filter(|r| r.applies_to(lang, source))
            .map(|r| r.target)
            .collect()
    }

    /// `true` when a transcription from `source` into `target` may exist for
    /// a sentence in `lang`.
    pub fn is_allowed_transcription(
        &self,
        lang: Option<&str>,
        source: Option<ScriptTag>,
        target: ScriptTag,
    ) -> bool {
        self.rule_for(lang, source, target).is_some()
    }

    /// The only script `lang` appears in as a source, or `None` when the
    /// language is unknown or written in several scripts.
    pub fn default_script(&self, lang: &str) -> Option<ScriptTag> {
        let mut sources = self.source_scripts(lang);
        match (sources.next(), sources.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// `true` when `lang` is written in more than one source script, so the
    /// script of a sentence has to be detected from its text.
    pub fn has_ambiguous_script(&self, lang: &str) -> bool {
        self.source_scripts(lang).nth(1).is_some()
    }

    /// The script a sentence is written in: its own tag, or the language
    /// default when the tag is missing.
    pub fn source_script(&self, sentence: &Sentence) -> Option<ScriptTag> {
        sentence
            .script
            .or_else(|| sentence.lang.as_deref().and_then(|l| self.default_script(l)))
    }

    // -----------------------------------------------------------------------
    // Row predicates
    // -----------------------------------------------------------------------

    /// Whether the reconciler should (re)generate this script.
    ///
    /// * absent row → yes
    /// * read-only row → never
    /// * empty text → yes
    /// * machine-generated row whose source digest no longer matches the
    ///   sentence text → yes
    /// * user-provided row → no, however old
    pub fn needs_regeneration(&self, existing: Option<&Transcription>, sentence: &Sentence) -> bool {
        let Some(row) = existing else {
            return true;
        };
        if row.readonly {
            return false;
        }
        if row.text.is_empty() {
            return true;
        }
        if row.is_user_provided() {
            return false;
        }
        row.source_digest.as_deref() != Some(sentence.text_digest().as_str())
    }

    /// Script-specific content validation applies to user-provided text only.
    pub fn validation_required(&self, transcription: &Transcription) -> bool {
        transcription.is_user_provided()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn source_scripts<'a>(&'a self, lang: &'a str) -> impl Iterator<Item = ScriptTag> + 'a {
        let mut seen: Vec<ScriptTag> = Vec::new();
        self.rules
            .iter()
            .filter(move |r| r.language == lang)
            .filter_map(move |r| {
                if seen.contains(&r.source) {
                    None
                } else {
                    seen.push(r.source);
                    Some(r.source)
                }
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
