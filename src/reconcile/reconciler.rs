//! [`TranscriptionReconciler`] — keeps a sentence's transcriptions in step
//! with its text without overwriting what users wrote.
//!
//! # Row life cycle (one script)
//!
//! ```text
//! absent ──sweep──▶ generated (user_id = None, needs_review)
//!                      │  ▲
//!          user save   │  │ sweep, when the sentence text changed
//!                      ▼  │ (or the text is empty)
//!                   confirmed (user_id = Some, needs_review = false)
//!                      │
//!                      └── user save ──▶ confirmed
//!
//! absent ──sweep──▶ readonly   (canonical pairs only; no edits, no sweeps)
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::convert::{ConvertError, ConverterRegistry, ScriptPair};
use crate::model::{
    Sentence, SentenceId, Transcription, TranscriptionId, TranscriptionInput, TranscriptionPatch,
    TranscriptionSeed, UserId,
};
use crate::policy::{ScriptRule, TranscriptionPolicy};
use crate::reconcile::error::{ReconcileError, Rejection};
use crate::script::ScriptTag;
use crate::store::{SentenceLookup, StoreError, TranscriptionStore};

/// Drives policy, converters and storage for whole sentences.
///
/// Holds no per-request state, so one instance can serve concurrent
/// requests for different sentences.
pub struct TranscriptionReconciler {
    policy: TranscriptionPolicy,
    converters: ConverterRegistry,
    store: Arc<dyn TranscriptionStore>,
    sentences: Arc<dyn SentenceLookup>,
}

impl TranscriptionReconciler {
    /// Create a reconciler.
    ///
    /// # Arguments
    ///
    /// * `policy`     — rule table deciding which scripts apply.
    /// * `converters` — generators, validators and detectors.
    /// * `store`      — transcription rows.
    /// * `sentences`  — parent sentence lookup for the save path.
    pub fn new(
        policy: TranscriptionPolicy,
        converters: ConverterRegistry,
        store: Arc<dyn TranscriptionStore>,
        sentences: Arc<dyn SentenceLookup>,
    ) -> Self {
        Self {
            policy,
            converters,
            store,
            sentences,
        }
    }

    pub fn policy(&self) -> &TranscriptionPolicy {
        &self.policy
    }

    // -----------------------------------------------------------------------
    // Generation path
    // -----------------------------------------------------------------------

    /// Build the `target` transcription of `sentence`.
    ///
    /// Text comes from `seed.text` when given, otherwise from the converter.
    /// With `persist`, the row is inserted, or merged into `seed.id` when
    /// that is set.  Without it the value is returned unsaved.
    ///
    /// This path trusts its text: no script validation runs.
    ///
    /// # Errors
    ///
    /// - [`Rejection`] (policy) — the direction is not allowed, or `seed.id`
    ///   is read-only or belongs to another sentence/script.
    /// - [`ConvertError`] — the converter failed.
    /// - [`StoreError::Duplicate`] — insert lost a race with another writer.
    /// - [`StoreError::Conflict`] — `seed.modified` is set and the row was
    ///   written to since.
    pub fn generate_transcription(
        &self,
        sentence: &Sentence,
        target: ScriptTag,
        persist: bool,
        seed: Option<TranscriptionSeed>,
    ) -> Result<Transcription, ReconcileError> {
        let rule = self.allowed_rule(sentence, target)?.clone();
        let seed = seed.unwrap_or_default();

        let (text, needs_review, source_digest) = match seed.text {
            Some(text) if text.is_empty() => {
                return Err(Rejection::validation("text", "must not be empty").into());
            }
            Some(text) => (text, seed.user_id.is_none(), None),
            None => {
                let generated = self.converters.generate(&pair_of(&rule), &sentence.text)?;
                (
                    generated.text,
                    seed.user_id.is_none() && generated.needs_review,
                    Some(sentence.text_digest()),
                )
            }
        };

        let now = Utc::now();
        let transcription = Transcription {
            id: seed.id,
            sentence_id: sentence.id,
            script: target,
            text,
            user_id: seed.user_id,
            readonly: rule.readonly,
            needs_review,
            kind: rule.kind,
            source_digest,
            created: now,
            modified: now,
        };

        if !persist {
            return Ok(transcription);
        }

        match seed.id {
            Some(id) => self.merge_generated(id, transcription, seed.modified),
            None => {
                let inserted = self.store.insert(transcription)?;
                log::debug!("sentence {}: inserted {target} transcription", sentence.id);
                Ok(inserted)
            }
        }
    }

    /// Create or refresh every transcription `sentence` should have.
    ///
    /// Returns the number of rows written.  Scripts whose row is current,
    /// user-owned or read-only are left alone, so a second call on an
    /// unchanged sentence writes nothing.
    ///
    /// A script that is rejected, loses an insert race, is written to by
    /// someone else while its text is generated, or whose converter fails
    /// is logged and skipped; only storage failures abort the sweep.
    pub fn generate_and_save_all_transcriptions_for(
        &self,
        sentence: &Sentence,
    ) -> Result<usize, ReconcileError> {
        let scripts = self.required_scripts(sentence);
        if scripts.is_empty() {
            log::debug!("sentence {}: no transcriptions apply", sentence.id);
            return Ok(0);
        }

        let existing = self.store.find_by_sentence(sentence.id)?;
        let mut written = 0;

        for script in scripts {
            let row = existing.iter().find(|t| t.script == script);
            if !self.policy.needs_regeneration(row, sentence) {
                log::debug!("sentence {}: {script} is up to date", sentence.id);
                continue;
            }

            let seed = row.map(TranscriptionSeed::refresh);
            match self.generate_transcription(sentence, script, true, seed) {
                Ok(_) => written += 1,
                Err(e) if e.is_local() => {
                    log::warn!("sentence {}: skipping {script}: {e}", sentence.id);
                }
                Err(e) => return Err(e),
            }
        }

        log::info!(
            "sentence {}: {written} transcription(s) written",
            sentence.id
        );
        Ok(written)
    }

    /// Complete `existing` with generated (unsaved) transcriptions for every
    /// required script it lacks.
    ///
    /// * No script already in `existing` is generated again; a repeated
    ///   script in `existing` keeps its first entry only.
    /// * Entries of `existing` keep their relative order.
    /// * Each generated entry is placed before the first supplied entry
    ///   that comes later in the language's canonical script order.
    ///
    /// Scripts that fail to generate are logged and left out.
    pub fn add_generated_transcriptions(
        &self,
        existing: Vec<Transcription>,
        sentence: &Sentence,
    ) -> Vec<Transcription> {
        let scripts = self.required_scripts(sentence);
        let rank = |script: ScriptTag| {
            scripts
                .iter()
                .position(|s| *s == script)
                .unwrap_or(usize::MAX)
        };

        let mut present: HashSet<ScriptTag> = HashSet::new();
        let existing: Vec<Transcription> = existing
            .into_iter()
            .filter(|t| {
                let first = present.insert(t.script);
                if !first {
                    log::debug!("sentence {}: dropping repeated {}", sentence.id, t.script);
                }
                first
            })
            .collect();

        let mut generated = Vec::new();
        for script in scripts.iter().copied().filter(|s| !present.contains(s)) {
            match self.generate_transcription(sentence, script, false, None) {
                Ok(t) => generated.push(t),
                Err(e) => log::warn!("sentence {}: cannot generate {script}: {e}", sentence.id),
            }
        }

        let mut merged = Vec::with_capacity(existing.len() + generated.len());
        let mut generated = generated.into_iter().peekable();
        for supplied in existing {
            let supplied_rank = rank(supplied.script);
            while let Some(g) = generated.next_if(|g| rank(g.script) < supplied_rank) {
                merged.push(g);
            }
            merged.push(supplied);
        }
        merged.extend(generated);
        merged
    }

    // -----------------------------------------------------------------------
    // User save path
    // -----------------------------------------------------------------------

    /// Create or edit a transcription on behalf of `current_user`
    /// (`None` for system-initiated saves).
    ///
    /// # Create (`input.id` is `None`)
    ///
    /// `sentence_id`, `script` and non-empty `text` are required; the
    /// sentence must exist; the direction must be allowed and not read-only.
    /// A user-owned row's text is validated by the pair converter.  The row belongs to
    /// `current_user`; a system-created row is marked for review.
    ///
    /// # Update (`input.id` is `Some`)
    ///
    /// Read-only rows, changes to `sentence_id`/`script` and rows whose
    /// direction the policy no longer allows are refused.  A user save
    /// claims the row and clears `needs_review`.  A system save only
    /// replaces the text.  Changed text on a user-owned row is validated.
    ///
    /// Every refusal is a [`ReconcileError::Rejected`] naming the field.
    pub fn save_transcription(
        &self,
        input: TranscriptionInput,
        current_user: Option<UserId>,
    ) -> Result<Transcription, ReconcileError> {
        let result = match input.id {
            None => self.create(input, current_user),
            Some(id) => self.update(id, input, current_user),
        };
        if let Err(ReconcileError::Rejected(r)) = &result {
            log::warn!("transcription save rejected: {r}");
        }
        result
    }

    fn create(
        &self,
        input: TranscriptionInput,
        current_user: Option<UserId>,
    ) -> Result<Transcription, ReconcileError> {
        let sentence_id = input
            .sentence_id
            .ok_or_else(|| Rejection::validation("sentence_id", "is required"))?;
        let script = parse_script(
            input
                .script
                .as_deref()
                .ok_or_else(|| Rejection::validation("script", "is required"))?,
        )?;
        let text = match input.text {
            None => return Err(Rejection::validation("text", "is required").into()),
            Some(t) if t.is_empty() => {
                return Err(Rejection::validation("text", "must not be empty").into())
            }
            Some(t) => t,
        };

        let sentence = self.parent_sentence(sentence_id)?;
        let rule = self.allowed_rule(&sentence, script)?.clone();
        if rule.readonly {
            return Err(Rejection::policy(
                "script",
                format!("{script} transcriptions of sentence {sentence_id} are read-only"),
            )
            .into());
        }

        let now = Utc::now();
        let row = Transcription {
            id: None,
            sentence_id,
            script,
            text,
            user_id: current_user,
            readonly: false,
            needs_review: current_user.is_none(),
            kind: rule.kind,
            source_digest: None,
            created: now,
            modified: now,
        };

        if self.policy.validation_required(&row) {
            self.check_user_text(&rule, &row.text)?;
        }

        match self.store.insert(row) {
            Ok(saved) => Ok(saved),
            Err(StoreError::Duplicate { .. }) => Err(Rejection::duplicate(
                "script",
                format!("sentence {sentence_id} already has a {script} transcription"),
            )
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    fn update(
        &self,
        id: TranscriptionId,
        input: TranscriptionInput,
        current_user: Option<UserId>,
    ) -> Result<Transcription, ReconcileError> {
        let existing = self
            .store
            .find_by_id(id)?
            .ok_or_else(|| Rejection::not_found("id", format!("transcription {id} does not exist")))?;

        if existing.readonly {
            return Err(Rejection::policy("id", format!("transcription {id} is read-only")).into());
        }
        if input.sentence_id.is_some_and(|s| s != existing.sentence_id) {
            return Err(Rejection::policy("sentence_id", "cannot be changed").into());
        }
        if let Some(raw) = input.script.as_deref() {
            if parse_script(raw)? != existing.script {
                return Err(Rejection::policy("script", "cannot be changed").into());
            }
        }

        let sentence = self.parent_sentence(existing.sentence_id)?;
        let rule = self.allowed_rule(&sentence, existing.script)?.clone();

        let text = match input.text {
            Some(t) if t.is_empty() => {
                return Err(Rejection::validation("text", "must not be empty").into())
            }
            Some(t) => t,
            None => existing.text.clone(),
        };
        let text_changed = text != existing.text;

        let mut patch = TranscriptionPatch::touch(Utc::now());
        if text_changed {
            patch.text = Some(text);
        }
        if let Some(user) = current_user {
            patch.user_id = Some(Some(user));
            patch.needs_review = Some(false);
        }

        let mut saved = existing;
        patch.apply(&mut saved);
        if text_changed && self.policy.validation_required(&saved) {
            self.check_user_text(&rule, &saved.text)?;
        }

        Ok(self.store.update(id, &patch)?)
    }

    // -----------------------------------------------------------------------
    // Script detection
    // -----------------------------------------------------------------------

    /// The script `text` in `lang` is written in.
    ///
    /// Ambiguous-script languages ask the registered detector every time;
    /// other languages answer with their single known script, or `None`.
    pub fn detect_script(&self, lang: &str, text: &str) -> Result<Option<ScriptTag>, ConvertError> {
        if self.policy.has_ambiguous_script(lang) {
            return self.converters.detect_script(lang, text).map(Some);
        }
        Ok(self.policy.default_script(lang))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn required_scripts(&self, sentence: &Sentence) -> Vec<ScriptTag> {
        self.policy
            .required_scripts(sentence.lang.as_deref(), self.policy.source_script(sentence))
    }

    fn allowed_rule(&self, sentence: &Sentence, target: ScriptTag) -> Result<&ScriptRule, Rejection> {
        let source = self.policy.source_script(sentence);
        self.policy
            .rule_for(sentence.lang.as_deref(), source, target)
            .ok_or_else(|| {
                Rejection::policy(
                    "script",
                    format!(
                        "{}/{} sentences cannot be transcribed into {target}",
                        sentence.lang.as_deref().unwrap_or("und"),
                        source.map_or("unknown", |s| s.as_str()),
                    ),
                )
            })
    }

    fn parent_sentence(&self, id: SentenceId) -> Result<Sentence, ReconcileError> {
        self.sentences.find_sentence(id)?.ok_or_else(|| {
            Rejection::not_found("sentence_id", format!("sentence {id} does not exist")).into()
        })
    }

    fn check_user_text(&self, rule: &ScriptRule, text: &str) -> Result<(), ReconcileError> {
        if self.converters.validate(&pair_of(rule), text, true)? {
            Ok(())
        } else {
            Err(Rejection::validation("text", format!("is not a valid {} transcription", rule.target)).into())
        }
    }

    fn merge_generated(
        &self,
        id: TranscriptionId,
        generated: Transcription,
        if_modified: Option<DateTime<Utc>>,
    ) -> Result<Transcription, ReconcileError> {
        let existing = self
            .store
            .find_by_id(id)?
            .ok_or_else(|| Rejection::not_found("id", format!("transcription {id} does not exist")))?;

        if existing.sentence_id != generated.sentence_id || existing.script != generated.script {
            return Err(Rejection::policy(
                "id",
                format!(
                    "transcription {id} is not the {} transcription of sentence {}",
                    generated.script, generated.sentence_id
                ),
            )
            .into());
        }
        if existing.readonly {
            return Err(Rejection::policy("id", format!("transcription {id} is read-only")).into());
        }

        let patch = TranscriptionPatch {
            text: Some(generated.text),
            user_id: Some(generated.user_id),
            needs_review: Some(generated.needs_review),
            kind: Some(generated.kind),
            source_digest: Some(generated.source_digest),
            modified: generated.modified,
            if_modified,
        };
        let updated = self.store.update(id, &patch)?;
        log::debug!(
            "sentence {}: refreshed {} transcription {id}",
            updated.sentence_id,
            updated.script
        );
        Ok(updated)
    }
}

fn pair_of(rule: &ScriptRule) -> ScriptPair {
    ScriptPair::new(&rule.language, rule.source, rule.target)
}

fn parse_script(raw: &str) -> Result<ScriptTag, Rejection> {
    raw.parse()
        .map_err(|_| Rejection::validation("script", format!("{raw:?} is not a recognised script")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{Generated, MockConverter, MockDetector, PairConverter};
    use crate::model::TranscriptionKind;
    use crate::reconcile::error::RejectionKind;
    use crate::store::MemoryStore;

    struct Fixture {
        reconciler: TranscriptionReconciler,
        store: Arc<MemoryStore>,
        furigana: Arc<MockConverter>,
        traditional: Arc<MockConverter>,
        pinyin: Arc<MockConverter>,
        jyutping: Arc<MockConverter>,
        detector: Arc<MockDetector>,
    }

    fn row(sentence_id: SentenceId, script: ScriptTag, text: &str) -> Transcription {
        let now = Utc::now();
        Transcription {
            id: None,
            sentence_id,
            script,
            text: text.into(),
            user_id: None,
            readonly: false,
            needs_review: true,
            kind: TranscriptionKind::Altscript,
            source_digest: None,
            created: now,
            modified: now,
        }
    }

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for sentence in [
            Sentence::new(1, "eng", Some(ScriptTag::Latn), "This is a sentence."),
            Sentence::new(2, "cmn", Some(ScriptTag::Hans), "我们试试看！"),
            Sentence::new(6, "jpn", Some(ScriptTag::Jpan), "今日は"),
            Sentence::new(10, "jpn", Some(ScriptTag::Jpan), "ちょっと待って。"),
            Sentence::new(11, "yue", Some(ScriptTag::Hant), "我哋試下。"),
        ] {
            store.put_sentence(sentence).unwrap();
        }

        // 1: furigana confirmed by user 7
        store
            .insert(Transcription {
                user_id: Some(7),
                needs_review: false,
                ..row(6, ScriptTag::Hrkt, "きょうは")
            })
            .unwrap();
        // 2: canonical traditional form
        store
            .insert(Transcription {
                readonly: true,
                source_digest: Some(
                    Sentence::new(2, "cmn", Some(ScriptTag::Hans), "我们试试看！").text_digest(),
                ),
                ..row(2, ScriptTag::Hant, "我們試試看！")
            })
            .unwrap();
        // 3: machine output generated from an older sentence text
        store
            .insert(Transcription {
                source_digest: Some("stale".into()),
                ..row(10, ScriptTag::Hrkt, "ちょっとまって。")
            })
            .unwrap();
        store
    }

    fn fixture_with(traditional: MockConverter) -> Fixture {
        let store = seeded_store();
        let furigana = Arc::new(MockConverter::ok("autogenerated furigana"));
        let traditional = Arc::new(traditional);
        let pinyin = Arc::new(MockConverter::ok("autogenerated pinyin"));
        let jyutping = Arc::new(MockConverter::ok("autogenerated jyutping"));
        let detector = Arc::new(MockDetector::answering(ScriptTag::Hans));

        let mut registry = ConverterRegistry::new();
        registry.register_shared(
            ScriptPair::new("jpn", ScriptTag::Jpan, ScriptTag::Hrkt),
            furigana.clone(),
        );
        registry.register_shared(
            ScriptPair::new("cmn", ScriptTag::Hans, ScriptTag::Hant),
            traditional.clone(),
        );
        registry.register_shared(
            ScriptPair::new("cmn", ScriptTag::Hans, ScriptTag::Latn),
            pinyin.clone(),
        );
        registry.register_shared(
            ScriptPair::new("yue", ScriptTag::Hant, ScriptTag::Latn),
            jyutping.clone(),
        );
        registry.register_shared_detector("cmn", detector.clone());

        let reconciler = TranscriptionReconciler::new(
            TranscriptionPolicy::default(),
            registry,
            store.clone(),
            store.clone(),
        );

        Fixture {
            reconciler,
            store,
            furigana,
            traditional,
            pinyin,
            jyutping,
            detector,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockConverter::ok("converted into traditional characters"))
    }

    impl Fixture {
        fn sentence(&self, id: SentenceId) -> Sentence {
            self.store.find_sentence(id).unwrap().expect("fixture sentence")
        }

        fn add_sentence(&self, id: SentenceId, lang: &str, script: ScriptTag, text: &str) -> Sentence {
            let sentence = Sentence::new(id, lang, Some(script), text);
            self.store.put_sentence(sentence.clone()).unwrap();
            sentence
        }
    }

    fn rejection(err: ReconcileError) -> Rejection {
        match err {
            ReconcileError::Rejected(r) => r,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    // -- sweep ------------------------------------------------------------

    #[test]
    fn sweep_creates_missing_romanisation() {
        let f = fixture();
        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&f.sentence(11))
            .unwrap();
        assert_eq!(written, 1);

        let t = f.store.find_one(11, ScriptTag::Latn).unwrap().unwrap();
        assert_eq!(t.text, "autogenerated jyutping");
        assert_eq!(t.kind, TranscriptionKind::Transcription);
        assert_eq!(t.user_id, None);
        assert!(t.needs_review);
        assert!(!t.readonly);
        assert_eq!(t.source_digest, Some(f.sentence(11).text_digest()));
        assert_eq!(f.jyutping.seen.lock().unwrap().as_slice(), ["我哋試下。"]);
    }

    #[test]
    fn sweep_skips_readonly_and_fills_the_rest() {
        let f = fixture();
        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&f.sentence(2))
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(f.traditional.generated(), 0);
        assert_eq!(f.pinyin.generated(), 1);

        let hant = f.store.find_by_id(2).unwrap().unwrap();
        assert_eq!(hant.text, "我們試試看！");
        let latn = f.store.find_one(2, ScriptTag::Latn).unwrap().unwrap();
        assert_eq!(latn.text, "autogenerated pinyin");
    }

    #[test]
    fn sweep_marks_canonical_forms_readonly() {
        let f = fixture();
        let sentence = f.add_sentence(30, "cmn", ScriptTag::Hans, "你好");
        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&sentence)
            .unwrap();
        assert_eq!(written, 2);

        let hant = f.store.find_one(30, ScriptTag::Hant).unwrap().unwrap();
        assert!(hant.readonly);
        assert_eq!(hant.kind, TranscriptionKind::Altscript);
        assert_eq!(hant.text, "converted into traditional characters");
    }

    #[test]
    fn second_sweep_writes_nothing() {
        let f = fixture();
        let sentence = f.add_sentence(30, "cmn", ScriptTag::Hans, "你好");
        f.reconciler
            .generate_and_save_all_transcriptions_for(&sentence)
            .unwrap();
        let before = f.store.snapshot().unwrap();

        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&sentence)
            .unwrap();
        assert_eq!(written, 0);
        assert_eq!(f.store.snapshot().unwrap(), before);
        assert_eq!(f.traditional.generated(), 1);
        assert_eq!(f.pinyin.generated(), 1);
    }

    #[test]
    fn sweep_refreshes_outdated_machine_output_in_place() {
        let f = fixture();
        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&f.sentence(10))
            .unwrap();
        assert_eq!(written, 1);

        let t = f.store.find_by_id(3).unwrap().unwrap();
        assert_eq!(t.text, "autogenerated furigana");
        assert_eq!(t.source_digest, Some(f.sentence(10).text_digest()));
        assert!(t.modified >= t.created);
        assert_eq!(f.store.find_by_sentence(10).unwrap().len(), 1);
    }

    #[test]
    fn sweep_never_overwrites_user_text() {
        let f = fixture();
        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&f.sentence(6))
            .unwrap();
        assert_eq!(written, 0);
        assert_eq!(f.furigana.generated(), 0);
        let t = f.store.find_by_id(1).unwrap().unwrap();
        assert_eq!(t.text, "きょうは");
        assert_eq!(t.user_id, Some(7));
    }

    #[test]
    fn sweep_fills_in_empty_user_text() {
        let f = fixture();
        let patch = TranscriptionPatch {
            text: Some(String::new()),
            ..TranscriptionPatch::touch(Utc::now())
        };
        f.store.update(1, &patch).unwrap();

        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&f.sentence(6))
            .unwrap();
        assert_eq!(written, 1);
        let t = f.store.find_by_id(1).unwrap().unwrap();
        assert_eq!(t.text, "autogenerated furigana");
        assert_eq!(t.user_id, None);
        assert!(t.needs_review);
    }

    #[test]
    fn sweep_continues_past_a_failing_converter() {
        let f = fixture_with(MockConverter::err(ConvertError::Timeout));
        let sentence = f.add_sentence(30, "cmn", ScriptTag::Hans, "你好");
        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&sentence)
            .unwrap();
        assert_eq!(written, 1);
        assert!(f.store.find_one(30, ScriptTag::Hant).unwrap().is_none());
        assert!(f.store.find_one(30, ScriptTag::Latn).unwrap().is_some());
    }

    #[test]
    fn sweep_ignores_languages_without_alternate_scripts() {
        let f = fixture();
        let before = f.store.count().unwrap();
        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&f.sentence(1))
            .unwrap();
        assert_eq!(written, 0);
        assert_eq!(f.store.count().unwrap(), before);
    }

    #[test]
    fn sweep_uses_language_default_when_script_is_unset() {
        let f = fixture();
        let mut sentence = f.add_sentence(40, "jpn", ScriptTag::Jpan, "猫");
        sentence.script = None;
        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&sentence)
            .unwrap();
        assert_eq!(written, 1);
        assert!(f.store.find_one(40, ScriptTag::Hrkt).unwrap().is_some());
    }

    /// Stands in for a user saving row `id` while the converter runs.
    struct EditedWhileGenerating {
        store: Arc<MemoryStore>,
        id: TranscriptionId,
    }

    impl PairConverter for EditedWhileGenerating {
        fn generate(&self, _text: &str) -> Result<Generated, ConvertError> {
            let row = self.store.find_by_id(self.id).unwrap().unwrap();
            let edit = TranscriptionPatch {
                text: Some("user text".into()),
                user_id: Some(Some(5)),
                needs_review: Some(false),
                ..TranscriptionPatch::touch(row.modified + chrono::Duration::seconds(1))
            };
            self.store.update(self.id, &edit).unwrap();
            Ok(Generated::new("machine text"))
        }
    }

    #[test]
    fn sweep_keeps_an_edit_made_while_generating() {
        let store = seeded_store();
        let mut registry = ConverterRegistry::new();
        registry.register(
            ScriptPair::new("jpn", ScriptTag::Jpan, ScriptTag::Hrkt),
            EditedWhileGenerating {
                store: store.clone(),
                id: 3,
            },
        );
        let reconciler = TranscriptionReconciler::new(
            TranscriptionPolicy::default(),
            registry,
            store.clone(),
            store.clone(),
        );

        let sentence = store.find_sentence(10).unwrap().unwrap();
        let written = reconciler
            .generate_and_save_all_transcriptions_for(&sentence)
            .unwrap();
        assert_eq!(written, 0);

        let t = store.find_by_id(3).unwrap().unwrap();
        assert_eq!(t.text, "user text");
        assert_eq!(t.user_id, Some(5));
        assert!(!t.needs_review);
    }

    struct BrokenStore;

    impl TranscriptionStore for BrokenStore {
        fn find_by_id(&self, _id: TranscriptionId) -> Result<Option<Transcription>, StoreError> {
            Ok(None)
        }

        fn find_by_sentence(&self, _sentence_id: SentenceId) -> Result<Vec<Transcription>, StoreError> {
            Ok(Vec::new())
        }

        fn find_one(
            &self,
            _sentence_id: SentenceId,
            _script: ScriptTag,
        ) -> Result<Option<Transcription>, StoreError> {
            Ok(None)
        }

        fn insert(&self, _transcription: Transcription) -> Result<Transcription, StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }

        fn update(&self, id: TranscriptionId, _patch: &TranscriptionPatch) -> Result<Transcription, StoreError> {
            Err(StoreError::NotFound(id))
        }

        fn count(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    #[test]
    fn sweep_aborts_on_storage_failure() {
        let mut registry = ConverterRegistry::new();
        let furigana = Arc::new(MockConverter::ok("かな"));
        registry.register_shared(
            ScriptPair::new("jpn", ScriptTag::Jpan, ScriptTag::Hrkt),
            furigana.clone(),
        );
        let sentences = Arc::new(MemoryStore::new());
        let reconciler = TranscriptionReconciler::new(
            TranscriptionPolicy::default(),
            registry,
            Arc::new(BrokenStore),
            sentences,
        );

        let sentence = Sentence::new(6, "jpn", Some(ScriptTag::Jpan), "今日は");
        let err = reconciler
            .generate_and_save_all_transcriptions_for(&sentence)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Store(StoreError::Io(_))));
        assert_eq!(furigana.generated(), 1);
    }

    #[test]
    fn concurrent_sweeps_create_one_row_per_script() {
        let f = fixture();
        let reconciler = Arc::new(f.reconciler);
        let sentence = f.store.find_sentence(11).unwrap().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reconciler = Arc::clone(&reconciler);
                let sentence = sentence.clone();
                std::thread::spawn(move || {
                    reconciler
                        .generate_and_save_all_transcriptions_for(&sentence)
                        .unwrap()
                })
            })
            .collect();
        let written: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(written, 1);
        assert_eq!(f.store.find_by_sentence(11).unwrap().len(), 1);
    }

    // -- generate_transcription ---------------------------------------------

    #[test]
    fn japanese_sentence_gets_generated_furigana() {
        let f = fixture();
        let t = f
            .reconciler
            .generate_transcription(&f.sentence(6), ScriptTag::Hrkt, false, None)
            .unwrap();
        assert_eq!(t.sentence_id, 6);
        assert_eq!(t.script, ScriptTag::Hrkt);
        assert_eq!(t.text, "autogenerated furigana");
        assert!(!t.readonly);
        assert!(t.needs_review);
        assert_eq!(t.user_id, None);
        assert_eq!(t.kind, TranscriptionKind::Altscript);
        assert_eq!(f.furigana.seen.lock().unwrap().as_slice(), ["今日は"]);
    }

    #[test]
    fn seeded_user_text_updates_the_row_in_place() {
        let f = fixture();
        let seed = TranscriptionSeed {
            id: Some(3),
            text: Some("あああ".into()),
            user_id: Some(33),
            ..TranscriptionSeed::default()
        };
        let t = f
            .reconciler
            .generate_transcription(&f.sentence(10), ScriptTag::Hrkt, true, Some(seed))
            .unwrap();
        assert_eq!(t.id, Some(3));
        assert_eq!(t.text, "あああ");
        assert_eq!(t.user_id, Some(33));
        assert!(!t.needs_review);
        assert_eq!(t.kind, TranscriptionKind::Altscript);
        assert_eq!(t.source_digest, None);
        assert_eq!(f.store.find_by_id(3).unwrap().unwrap(), t);
        assert_eq!(f.store.find_by_sentence(10).unwrap().len(), 1);
        assert_eq!(f.furigana.generated(), 0);
    }

    #[test]
    fn unsaved_generation_leaves_store_alone() {
        let f = fixture();
        let before = f.store.count().unwrap();
        let t = f
            .reconciler
            .generate_transcription(&f.sentence(11), ScriptTag::Latn, false, None)
            .unwrap();
        assert_eq!(t.id, None);
        assert_eq!(t.text, "autogenerated jyutping");
        assert_eq!(f.store.count().unwrap(), before);
    }

    #[test]
    fn generation_into_disallowed_script_is_rejected() {
        let f = fixture();
        let err = f
            .reconciler
            .generate_transcription(&f.sentence(6), ScriptTag::Latn, true, None)
            .unwrap_err();
        let r = rejection(err);
        assert_eq!(r.field, "script");
        assert_eq!(r.kind, RejectionKind::Policy);
        assert_eq!(f.furigana.generated(), 0);
    }

    #[test]
    fn seeded_user_text_skips_the_converter() {
        let f = fixture();
        let seed = TranscriptionSeed {
            text: Some("ngo5 dei6 si3 haa5".into()),
            user_id: Some(4),
            ..TranscriptionSeed::default()
        };
        let t = f
            .reconciler
            .generate_transcription(&f.sentence(11), ScriptTag::Latn, true, Some(seed))
            .unwrap();
        assert!(t.id.is_some());
        assert_eq!(t.user_id, Some(4));
        assert!(!t.needs_review);
        assert_eq!(t.source_digest, None);
        assert_eq!(f.jyutping.generated(), 0);
        assert_eq!(f.jyutping.validated(), 0);
    }

    #[test]
    fn certain_converter_output_needs_no_review() {
        let store = seeded_store();
        let mut registry = ConverterRegistry::new();
        registry.register(
            ScriptPair::new("yue", ScriptTag::Hant, ScriptTag::Latn),
            MockConverter::certain("ngo5 dei6"),
        );
        let reconciler = TranscriptionReconciler::new(
            TranscriptionPolicy::default(),
            registry,
            store.clone(),
            store.clone(),
        );
        let sentence = store.find_sentence(11).unwrap().unwrap();
        let t = reconciler
            .generate_transcription(&sentence, ScriptTag::Latn, false, None)
            .unwrap();
        assert!(!t.needs_review);
    }

    #[test]
    fn seeded_id_must_match_sentence_and_script() {
        let f = fixture();
        let err = f
            .reconciler
            .generate_transcription(
                &f.sentence(10),
                ScriptTag::Hrkt,
                true,
                Some(TranscriptionSeed::existing(1)),
            )
            .unwrap_err();
        assert_eq!(rejection(err).field, "id");
        assert_eq!(f.store.find_by_id(1).unwrap().unwrap().text, "きょうは");
    }

    #[test]
    fn readonly_row_is_never_regenerated() {
        let f = fixture();
        let err = f
            .reconciler
            .generate_transcription(
                &f.sentence(2),
                ScriptTag::Hant,
                true,
                Some(TranscriptionSeed::existing(2)),
            )
            .unwrap_err();
        let r = rejection(err);
        assert_eq!(r.field, "id");
        assert_eq!(r.kind, RejectionKind::Policy);
        assert_eq!(f.store.find_by_id(2).unwrap().unwrap().text, "我們試試看！");
    }

    #[test]
    fn generation_without_seed_reports_duplicate() {
        let f = fixture();
        let err = f
            .reconciler
            .generate_transcription(&f.sentence(10), ScriptTag::Hrkt, true, None)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Store(StoreError::Duplicate { .. })));
    }

    // -- add_generated_transcriptions ----------------------------------------

    #[test]
    fn missing_scripts_are_generated_in_canonical_order() {
        let f = fixture();
        let sentence = f.sentence(2);
        let latn = f
            .reconciler
            .generate_transcription(&sentence, ScriptTag::Latn, true, None)
            .unwrap();

        let all = f.reconciler.add_generated_transcriptions(vec![latn.clone()], &sentence);
        let scripts: Vec<_> = all.iter().map(|t| t.script).collect();
        assert_eq!(scripts, vec![ScriptTag::Hant, ScriptTag::Latn]);
        assert_eq!(all[0].id, None);
        assert_eq!(all[0].text, "converted into traditional characters");
        assert_eq!(all[1], latn);
    }

    #[test]
    fn nothing_is_added_when_complete() {
        let f = fixture();
        let existing = f.store.find_by_sentence(6).unwrap();
        let all = f
            .reconciler
            .add_generated_transcriptions(existing.clone(), &f.sentence(6));
        assert_eq!(all, existing);
        assert_eq!(f.furigana.generated(), 0);
    }

    #[test]
    fn empty_input_gets_every_required_script() {
        let f = fixture();
        let all = f.reconciler.add_generated_transcriptions(Vec::new(), &f.sentence(11));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "autogenerated jyutping");
        assert_eq!(all[0].id, None);
    }

    #[test]
    fn repeated_scripts_keep_their_first_entry() {
        let f = fixture();
        let first = row(6, ScriptTag::Hrkt, "first");
        let second = row(6, ScriptTag::Hrkt, "second");
        let all = f
            .reconciler
            .add_generated_transcriptions(vec![first, second], &f.sentence(6));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "first");
    }

    #[test]
    fn supplied_order_is_kept_and_unknown_scripts_go_last() {
        let f = fixture();
        let sentence = f.add_sentence(30, "cmn", ScriptTag::Hans, "你好");
        let extra = row(30, ScriptTag::Cyrl, "extra");
        let latn = row(30, ScriptTag::Latn, "ni3 hao3");

        let all = f
            .reconciler
            .add_generated_transcriptions(vec![extra, latn], &sentence);
        let scripts: Vec<_> = all.iter().map(|t| t.script).collect();
        assert_eq!(scripts, vec![ScriptTag::Hant, ScriptTag::Cyrl, ScriptTag::Latn]);
    }

    #[test]
    fn failed_generation_is_left_out() {
        let f = fixture_with(MockConverter::err(ConvertError::EmptyResult));
        let sentence = f.add_sentence(30, "cmn", ScriptTag::Hans, "你好");
        let all = f.reconciler.add_generated_transcriptions(Vec::new(), &sentence);
        let scripts: Vec<_> = all.iter().map(|t| t.script).collect();
        assert_eq!(scripts, vec![ScriptTag::Latn]);
    }

    // -- save_transcription: create ----------------------------------------

    #[test]
    fn user_creates_a_transcription() {
        let f = fixture();
        let t = f
            .reconciler
            .save_transcription(TranscriptionInput::create(11, "Latn", "ngo5 dei6"), Some(4))
            .unwrap();
        assert!(t.id.is_some());
        assert_eq!(t.user_id, Some(4));
        assert!(!t.needs_review);
        assert_eq!(t.kind, TranscriptionKind::Transcription);
        assert_eq!(t.source_digest, None);
        assert_eq!(f.jyutping.validated(), 1);
        assert_eq!(f.jyutping.generated(), 0);
    }

    #[test]
    fn system_created_transcription_needs_review() {
        let f = fixture();
        let t = f
            .reconciler
            .save_transcription(TranscriptionInput::create(11, "Latn", "ngo5 dei6"), None)
            .unwrap();
        assert_eq!(t.user_id, None);
        assert!(t.needs_review);
        assert_eq!(f.jyutping.validated(), 0);
    }

    #[test]
    fn create_into_readonly_script_is_rejected() {
        let f = fixture();
        f.add_sentence(30, "cmn", ScriptTag::Hans, "你好");
        let err = f
            .reconciler
            .save_transcription(TranscriptionInput::create(30, "Hant", "你好"), Some(4))
            .unwrap_err();
        let r = rejection(err);
        assert_eq!(r.field, "script");
        assert_eq!(r.kind, RejectionKind::Policy);
        assert!(f.store.find_one(30, ScriptTag::Hant).unwrap().is_none());
    }

    #[test]
    fn create_duplicate_is_rejected() {
        let f = fixture();
        let err = f
            .reconciler
            .save_transcription(TranscriptionInput::create(6, "Hrkt", "きょう"), Some(4))
            .unwrap_err();
        let r = rejection(err);
        assert_eq!(r.field, "script");
        assert_eq!(r.kind, RejectionKind::Duplicate);
        assert_eq!(f.store.find_by_sentence(6).unwrap().len(), 1);
    }

    #[test]
    fn create_for_missing_sentence_is_rejected() {
        let f = fixture();
        let err = f
            .reconciler
            .save_transcription(TranscriptionInput::create(99, "Hrkt", "かな"), Some(4))
            .unwrap_err();
        let r = rejection(err);
        assert_eq!(r.field, "sentence_id");
        assert_eq!(r.kind, RejectionKind::NotFound);
    }

    #[test]
    fn create_in_disallowed_script_is_rejected() {
        let f = fixture();
        let err = f
            .reconciler
            .save_transcription(TranscriptionInput::create(1, "Hrkt", "かな"), Some(4))
            .unwrap_err();
        let r = rejection(err);
        assert_eq!(r.field, "script");
        assert_eq!(r.kind, RejectionKind::Policy);
    }

    #[test]
    fn create_with_unknown_script_tag_is_rejected() {
        let f = fixture();
        let err = f
            .reconciler
            .save_transcription(TranscriptionInput::create(6, "Xxxx", "かな"), Some(4))
            .unwrap_err();
        let r = rejection(err);
        assert_eq!(r.field, "script");
        assert_eq!(r.kind, RejectionKind::Validation);
    }

    #[test]
    fn create_requires_every_field() {
        let f = fixture();
        let cases = [
            (
                TranscriptionInput {
                    sentence_id: None,
                    ..TranscriptionInput::create(11, "Latn", "x")
                },
                "sentence_id",
            ),
            (
                TranscriptionInput {
                    script: None,
                    ..TranscriptionInput::create(11, "Latn", "x")
                },
                "script",
            ),
            (
                TranscriptionInput {
                    text: None,
                    ..TranscriptionInput::create(11, "Latn", "x")
                },
                "text",
            ),
            (TranscriptionInput::create(11, "Latn", ""), "text"),
        ];
        for (input, field) in cases {
            let r = rejection(f.reconciler.save_transcription(input, Some(4)).unwrap_err());
            assert_eq!(r.field, field);
            assert_eq!(r.kind, RejectionKind::Validation);
        }
        assert!(f.store.find_one(11, ScriptTag::Latn).unwrap().is_none());
    }

    #[test]
    fn create_with_invalid_user_text_is_rejected() {
        let store = seeded_store();
        let mut registry = ConverterRegistry::new();
        registry.register(
            ScriptPair::new("yue", ScriptTag::Hant, ScriptTag::Latn),
            MockConverter::ok("ngo5").rejecting(),
        );
        let reconciler = TranscriptionReconciler::new(
            TranscriptionPolicy::default(),
            registry,
            store.clone(),
            store.clone(),
        );
        let err = reconciler
            .save_transcription(TranscriptionInput::create(11, "Latn", "not jyutping"), Some(4))
            .unwrap_err();
        let r = rejection(err);
        assert_eq!(r.field, "text");
        assert_eq!(r.kind, RejectionKind::Validation);
        assert!(store.find_one(11, ScriptTag::Latn).unwrap().is_none());
    }

    // -- save_transcription: update ----------------------------------------

    #[test]
    fn user_edit_claims_machine_output() {
        let f = fixture();
        let t = f
            .reconciler
            .save_transcription(TranscriptionInput::edit(3, "ちょっとまって"), Some(9))
            .unwrap();
        assert_eq!(t.id, Some(3));
        assert_eq!(t.text, "ちょっとまって");
        assert_eq!(t.user_id, Some(9));
        assert!(!t.needs_review);
        assert_eq!(f.furigana.validated(), 1);

        // the sweep now leaves it alone
        let written = f
            .reconciler
            .generate_and_save_all_transcriptions_for(&f.sentence(10))
            .unwrap();
        assert_eq!(written, 0);
    }

    #[test]
    fn confirming_unchanged_text_skips_validation() {
        let f = fixture();
        let existing = f.store.find_by_id(3).unwrap().unwrap();
        let t = f
            .reconciler
            .save_transcription(TranscriptionInput::from_row(&existing), Some(9))
            .unwrap();
        assert_eq!(t.text, existing.text);
        assert_eq!(t.user_id, Some(9));
        assert!(!t.needs_review);
        assert_eq!(f.furigana.validated(), 0);
    }

    #[test]
    fn system_edit_of_user_row_keeps_owner_and_validates() {
        let f = fixture();
        let t = f
            .reconciler
            .save_transcription(TranscriptionInput::edit(1, "きょうわ"), None)
            .unwrap();
        assert_eq!(t.text, "きょうわ");
        assert_eq!(t.user_id, Some(7));
        assert!(!t.needs_review);
        assert_eq!(f.furigana.validated(), 1);
    }

    #[test]
    fn system_edit_of_generated_row_stays_under_review() {
        let f = fixture();
        let t = f
            .reconciler
            .save_transcription(TranscriptionInput::edit(3, "ちょっと"), None)
            .unwrap();
        assert_eq!(t.id, Some(3));
        assert_eq!(t.text, "ちょっと");
        assert_eq!(t.user_id, None);
        assert!(t.needs_review);
        assert_eq!(f.furigana.validated(), 0);
    }

    #[test]
    fn edits_are_refused_once_the_pair_is_disallowed() {
        let f = fixture();
        f.add_sentence(10, "eng", ScriptTag::Latn, "Wait a moment.");
        let before = f.store.find_by_id(3).unwrap().unwrap();

        let r = rejection(
            f.reconciler
                .save_transcription(TranscriptionInput::edit(3, "edited"), None)
                .unwrap_err(),
        );
        assert_eq!(r.field, "script");
        assert_eq!(r.kind, RejectionKind::Policy);

        let confirm = TranscriptionInput {
            id: Some(3),
            ..TranscriptionInput::default()
        };
        let r = rejection(f.reconciler.save_transcription(confirm, Some(4)).unwrap_err());
        assert_eq!(r.field, "script");
        assert_eq!(r.kind, RejectionKind::Policy);

        assert_eq!(f.store.find_by_id(3).unwrap().unwrap(), before);
    }

    #[test]
    fn readonly_row_cannot_be_edited() {
        let f = fixture();
        let err = f
            .reconciler
            .save_transcription(TranscriptionInput::edit(2, "改"), Some(4))
            .unwrap_err();
        let r = rejection(err);
        assert_eq!(r.field, "id");
        assert_eq!(r.kind, RejectionKind::Policy);
        assert_eq!(f.store.find_by_id(2).unwrap().unwrap().text, "我們試試看！");
    }

    #[test]
    fn sentence_and_script_cannot_change() {
        let f = fixture();
        let existing = f.store.find_by_id(3).unwrap().unwrap();

        let moved = TranscriptionInput {
            sentence_id: Some(6),
            ..TranscriptionInput::from_row(&existing)
        };
        let r = rejection(f.reconciler.save_transcription(moved, Some(4)).unwrap_err());
        assert_eq!(r.field, "sentence_id");
        assert_eq!(r.kind, RejectionKind::Policy);

        let rescripted = TranscriptionInput {
            script: Some("Latn".into()),
            ..TranscriptionInput::from_row(&existing)
        };
        let r = rejection(f.reconciler.save_transcription(rescripted, Some(4)).unwrap_err());
        assert_eq!(r.field, "script");
        assert_eq!(r.kind, RejectionKind::Policy);

        assert_eq!(f.store.find_by_id(3).unwrap().unwrap(), existing);
    }

    #[test]
    fn edit_to_empty_text_is_rejected() {
        let f = fixture();
        let r = rejection(
            f.reconciler
                .save_transcription(TranscriptionInput::edit(3, ""), Some(4))
                .unwrap_err(),
        );
        assert_eq!(r.field, "text");
        assert_eq!(r.kind, RejectionKind::Validation);
    }

    #[test]
    fn edit_of_missing_row_is_rejected() {
        let f = fixture();
        let r = rejection(
            f.reconciler
                .save_transcription(TranscriptionInput::edit(77, "x"), Some(4))
                .unwrap_err(),
        );
        assert_eq!(r.field, "id");
        assert_eq!(r.kind, RejectionKind::NotFound);
    }

    // -- detect_script ------------------------------------------------------

    #[test]
    fn ambiguous_language_asks_the_detector() {
        let f = fixture();
        let script = f.reconciler.detect_script("cmn", "我们").unwrap();
        assert_eq!(script, Some(ScriptTag::Hans));
        assert_eq!(f.detector.seen.lock().unwrap().as_slice(), ["我们"]);
    }

    #[test]
    fn single_script_language_uses_its_default() {
        let f = fixture();
        assert_eq!(
            f.reconciler.detect_script("jpn", "今日は").unwrap(),
            Some(ScriptTag::Jpan)
        );
        assert_eq!(f.reconciler.detect_script("eng", "Hello").unwrap(), None);
        assert!(f.detector.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn ambiguous_language_without_detector_fails() {
        let f = fixture();
        let err = f.reconciler.detect_script("uzb", "salom").unwrap_err();
        assert!(matches!(err, ConvertError::NoDetector(_)));
    }
}
