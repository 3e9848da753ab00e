//! Application entry point — altscript sweep.
//!
//! # Usage
//!
//! ```text
//! altscript [SENTENCES_JSON]
//! ```
//!
//! # Startup sequence
//!
//! 1. Load [`AppConfig`] from disk (returns default on first run).
//! 2. Initialise logging with the configured default filter.
//! 3. Open the [`FileStore`].
//! 4. Import sentences from `SENTENCES_JSON` (a JSON array), if given.
//! 5. Build the [`ConverterRegistry`] from config.
//! 6. Sweep every stored sentence and log the number of rows written.

use std::path::Path;
use std::sync::Arc;

use altscript::{
    config::AppConfig,
    convert::ConverterRegistry,
    model::Sentence,
    reconcile::TranscriptionReconciler,
    store::{FileStore, TranscriptionStore},
};
use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// Sentence import
// ---------------------------------------------------------------------------

fn import_sentences(store: &FileStore, path: &Path) -> Result<usize> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let sentences: Vec<Sentence> = serde_json::from_str(&data)
        .with_context(|| format!("parsing {}", path.display()))?;

    let count = sentences.len();
    for sentence in sentences {
        store.put_sentence(sentence)?;
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Configuration
    let loaded = AppConfig::load();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    // 2. Logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.default_filter.as_str()),
    )
    .init();
    log::info!("altscript starting up");
    if let Err(e) = &loaded {
        log::warn!("Failed to load config ({e}); using defaults");
    }

    // 3. Store
    let store_path = config.store_path();
    let store = Arc::new(
        FileStore::open(&store_path)
            .with_context(|| format!("opening store {}", store_path.display()))?,
    );
    log::info!("Store: {}", store_path.display());

    // 4. Optional import
    if let Some(arg) = std::env::args_os().nth(1) {
        let imported = import_sentences(&store, Path::new(&arg))?;
        log::info!("Imported {imported} sentence(s)");
    }

    // 5. Converters
    let policy = config.policy.to_policy();
    let converters = ConverterRegistry::from_config(&config.converter, &policy);
    if !config.converter.enabled {
        log::warn!("Converter service disabled; no transcriptions will be generated");
    }

    let reconciler = TranscriptionReconciler::new(policy, converters, store.clone(), store.clone());

    // 6. Sweep
    let sentences = store.sentences()?;
    let mut written = 0;
    for sentence in &sentences {
        written += reconciler.generate_and_save_all_transcriptions_for(sentence)?;
    }

    log::info!(
        "Swept {} sentence(s): {written} transcription(s) written, {} stored",
        sentences.len(),
        store.count()?
    );
    Ok(())
}
