//! [`ConverterRegistry`] — pair-keyed lookup of converters and detectors.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ConverterConfig;
use crate::convert::converter::{ConvertError, Generated, PairConverter, ScriptDetector, ScriptPair};
use crate::convert::http::{HttpConverter, HttpDetector};
use crate::policy::TranscriptionPolicy;
use crate::script::ScriptTag;

/// Maps each [`ScriptPair`] to its converter and each language to its script
/// detector.
///
/// Cloning is cheap: entries are shared `Arc`s.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<ScriptPair, Arc<dyn PairConverter>>,
    detectors: HashMap<String, Arc<dyn ScriptDetector>>,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pairs: Vec<String> = self.converters.keys().map(|p| p.to_string()).collect();
        pairs.sort();
        let mut detectors: Vec<&String> = self.detectors.keys().collect();
        detectors.sort();
        f.debug_struct("ConverterRegistry")
            .field("converters", &pairs)
            .field("detectors", &detectors)
            .finish()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the HTTP service adapters for every rule of `policy`, and a
    /// detector for every ambiguous-script language.
    ///
    /// Returns an empty registry when `config.enabled` is `false`.
    pub fn from_config(config: &ConverterConfig, policy: &TranscriptionPolicy) -> Self {
        let mut registry = Self::new();
        if !config.enabled {
            log::info!("converter service disabled; registry left empty");
            return registry;
        }

        let client = HttpConverter::client(config);
        for rule in policy.rules() {
            let pair = ScriptPair::new(&rule.language, rule.source, rule.target);
            let converter = HttpConverter::new(client.clone(), &config.base_url, pair.clone());
            registry.register(pair, converter);

            if policy.has_ambiguous_script(&rule.language) && !registry.has_detector(&rule.language) {
                let detector = HttpDetector::new(client.clone(), &config.base_url, &rule.language);
                registry.register_detector(&rule.language, detector);
            }
        }

        log::debug!("converter registry built: {registry:?}");
        registry
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register (or replace) the converter for `pair`.
    pub fn register(&mut self, pair: ScriptPair, converter: impl PairConverter + 'static) {
        self.converters.insert(pair, Arc::new(converter));
    }

    /// Register an already shared converter.
    pub fn register_shared(&mut self, pair: ScriptPair, converter: Arc<dyn PairConverter>) {
        self.converters.insert(pair, converter);
    }

    /// Register (or replace) the script detector for `language`.
    pub fn register_detector(&mut self, language: &str, detector: impl ScriptDetector + 'static) {
        self.detectors.insert(language.to_string(), Arc::new(detector));
    }

    /// Register an already shared detector.
    pub fn register_shared_detector(&mut self, language: &str, detector: Arc<dyn ScriptDetector>) {
        self.detectors.insert(language.to_string(), detector);
    }

    pub fn has_detector(&self, language: &str) -> bool {
        self.detectors.contains_key(language)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    pub fn converter(&self, pair: &ScriptPair) -> Result<&Arc<dyn PairConverter>, ConvertError> {
        self.converters
            .get(pair)
            .ok_or_else(|| ConvertError::NoConverter(pair.clone()))
    }

    /// Run the generator for `pair` on `text`.
    pub fn generate(&self, pair: &ScriptPair, text: &str) -> Result<Generated, ConvertError> {
        let generated = self.converter(pair)?.generate(text)?;
        log::debug!("{pair}: generated {} bytes", generated.text.len());
        Ok(generated)
    }

    /// Run the validator for `pair` on `text`.
    pub fn validate(&self, pair: &ScriptPair, text: &str, user_provided: bool) -> Result<bool, ConvertError> {
        self.converter(pair)?.validate(text, user_provided)
    }

    /// Run the detector registered for `language`.
    pub fn detect_script(&self, language: &str, text: &str) -> Result<ScriptTag, ConvertError> {
        self.detectors
            .get(language)
            .ok_or_else(|| ConvertError::NoDetector(language.to_string()))?
            .detect(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
