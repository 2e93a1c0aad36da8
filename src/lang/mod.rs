//! Language identification and spoken-language selection.
//!
//! [`detect`](detect::detect) guesses the natural language of a text
//! fragment with whatlang's trigram model, restricted to the languages the
//! tutor service supports. [`select_language`](select::select_language)
//! turns that guess, the sender role, and the user profile into the language
//! code requested from the speech-synthesis endpoint.

mod detect;
mod select;

pub use detect::detect;
pub use select::select_language;

use serde::{Deserialize, Serialize};

/// A language the tutor service supports.
///
/// Wire format is the two-letter code used throughout the backend API
/// (`background.native_lang`, `background.target_lang`, the synthesis
/// request's `language` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LangCode {
    /// English.
    En,
    /// Spanish.
    Es,
    /// French.
    Fr,
    /// German.
    De,
    /// Italian.
    It,
    /// Mandarin Chinese.
    Zh,
}

impl LangCode {
    /// The two-letter wire code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::De => "de",
            Self::It => "it",
            Self::Zh => "zh",
        }
    }

    /// Parse a two-letter wire code. Unknown codes yield `None`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            "fr" => Some(Self::Fr),
            "de" => Some(Self::De),
            "it" => Some(Self::It),
            "zh" => Some(Self::Zh),
            _ => None,
        }
    }
}

impl std::fmt::Display for LangCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
