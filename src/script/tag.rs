//! The recognised ISO 15924 script tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// UnknownScript
// ---------------------------------------------------------------------------

/// Returned when a string is not one of the recognised [`ScriptTag`]s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown script tag: {0:?}")]
pub struct UnknownScript(pub String);

// ---------------------------------------------------------------------------
// ScriptTag
// ---------------------------------------------------------------------------

/// A writing system, identified by its four-letter ISO 15924 code.
///
/// | Tag    | Writing system                        |
/// |--------|---------------------------------------|
/// | `Jpan` | Japanese (kanji + kana)               |
/// | `Hrkt` | Japanese syllabaries (kana only)      |
/// | `Hans` | Han, simplified                       |
/// | `Hant` | Han, traditional                      |
/// | `Latn` | Latin, including romanisations        |
/// | `Cyrl` | Cyrillic                              |
///
/// Serialises as the bare tag (`"Hrkt"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScriptTag {
    Arab,
    Cyrl,
    Deva,
    Grek,
    Hans,
    Hant,
    Hira,
    Hrkt,
    Jpan,
    Kana,
    Kore,
    Latn,
}

impl ScriptTag {
    /// Every recognised tag, in alphabetical order.
    pub const ALL: [ScriptTag; 12] = [
        ScriptTag::Arab,
        ScriptTag::Cyrl,
        ScriptTag::Deva,
        ScriptTag::Grek,
        ScriptTag::Hans,
        ScriptTag::Hant,
        ScriptTag::Hira,
        ScriptTag::Hrkt,
        ScriptTag::Jpan,
        ScriptTag::Kana,
        ScriptTag::Kore,
        ScriptTag::Latn,
    ];

    /// The four-letter code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptTag::Arab => "Arab",
            ScriptTag::Cyrl => "Cyrl",
            ScriptTag::Deva => "Deva",
            ScriptTag::Grek => "Grek",
            ScriptTag::Hans => "Hans",
            ScriptTag::Hant => "Hant",
            ScriptTag::Hira => "Hira",
            ScriptTag::Hrkt => "Hrkt",
            ScriptTag::Jpan => "Jpan",
            ScriptTag::Kana => "Kana",
            ScriptTag::Kore => "Kore",
            ScriptTag::Latn => "Latn",
        }
    }
}

impl fmt::Display for ScriptTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptTag {
    type Err = UnknownScript;

    /// Parses an exact, case-sensitive ISO 15924 code.
    ///
    /// ```
    /// use altscript::script::ScriptTag;
    ///
    /// assert_eq!("Hrkt".parse::<ScriptTag>().unwrap(), ScriptTag::Hrkt);
    /// assert!("ABCD".parse::<ScriptTag>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScriptTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| UnknownScript(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
