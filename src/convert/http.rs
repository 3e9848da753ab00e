//! HTTP adapters for an external transcription service.
//!
//! Every call is a JSON `POST` below the configured base URL:
//!
//! | Route                                | Body                          | Reply                              |
//! |--------------------------------------|-------------------------------|------------------------------------|
//! | `/generate/{lang}/{from}/{to}`       | `{"text"}`                    | `{"text", "needs_review"?}`        |
//! | `/validate/{lang}/{from}/{to}`       | `{"text", "user_provided"}`   | `{"valid"}`                        |
//! | `/detect/{lang}`                     | `{"text"}`                    | `{"script"}`                       |
//!
//! All connection details come from [`ConverterConfig`]; nothing is
//! hardcoded.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::ConverterConfig;
use crate::convert::converter::{ConvertError, Generated, PairConverter, ScriptDetector, ScriptPair};
use crate::script::ScriptTag;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateReply {
    text: String,
    #[serde(default = "default_needs_review")]
    needs_review: bool,
}

fn default_needs_review() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ValidateReply {
    valid: bool,
}

#[derive(Debug, Deserialize)]
struct DetectReply {
    script: String,
}

fn trim_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

// ---------------------------------------------------------------------------
// HttpConverter
// ---------------------------------------------------------------------------

/// Calls the service's generate/validate routes for one [`ScriptPair`].
pub struct HttpConverter {
    client: Client,
    base_url: String,
    pair: ScriptPair,
}

impl HttpConverter {
    /// Build the shared blocking client with the per-request timeout from
    /// `config.timeout_secs`.  A default client is used if the builder fails.
    pub fn client(config: &ConverterConfig) -> Client {
        Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new())
    }

    pub fn new(client: Client, base_url: &str, pair: ScriptPair) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
            pair,
        }
    }

    fn url(&self, action: &str) -> String {
        format!(
            "{}/{action}/{}/{}/{}",
            self.base_url, self.pair.language, self.pair.source, self.pair.target
        )
    }
}

impl PairConverter for HttpConverter {
    fn generate(&self, text: &str) -> Result<Generated, ConvertError> {
        let body = serde_json::json!({ "text": text });
        let response = self
            .client
            .post(self.url("generate"))
            .json(&body)
            .send()?
            .error_for_status()?;

        let reply: GenerateReply = response
            .json()
            .map_err(|e| ConvertError::Parse(e.to_string()))?;

        let generated = reply.text.trim().to_string();
        if generated.is_empty() {
            return Err(ConvertError::EmptyResult);
        }

        Ok(Generated {
            text: generated,
            needs_review: reply.needs_review,
        })
    }

    fn validate(&self, text: &str, user_provided: bool) -> Result<bool, ConvertError> {
        let body = serde_json::json!({ "text": text, "user_provided": user_provided });
        let response = self
            .client
            .post(self.url("validate"))
            .json(&body)
            .send()?
            .error_for_status()?;

        let reply: ValidateReply = response
            .json()
            .map_err(|e| ConvertError::Parse(e.to_string()))?;
        Ok(reply.valid)
    }
}

// ---------------------------------------------------------------------------
// HttpDetector
// ---------------------------------------------------------------------------

/// Calls the service's detect route for one language.
pub struct HttpDetector {
    client: Client,
    base_url: String,
    language: String,
}

impl HttpDetector {
    pub fn new(client: Client, base_url: &str, language: &str) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
            language: language.to_string(),
        }
    }

    fn url(&self) -> String {
        format!("{}/detect/{}", self.base_url, self.language)
    }
}

impl ScriptDetector for HttpDetector {
    fn detect(&self, text: &str) -> Result<ScriptTag, ConvertError> {
        let body = serde_json::json!({ "text": text });
        let response = self
            .client
            .post(self.url())
            .json(&body)
            .send()?
            .error_for_status()?;

        let reply: DetectReply = response
            .json()
            .map_err(|e| ConvertError::Parse(e.to_string()))?;
        reply
            .script
            .parse()
            .map_err(|e: crate::script::UnknownScript| ConvertError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
