//! Spoken-language selection policy for synthesized playback.
//!
//! Replaces the original client's inline string heuristics with one ordered,
//! testable decision table. Pure and deterministic given its inputs.

use super::LangCode;
use crate::session::{Sender, UserProfile};

/// Decide which language to request speech synthesis in for a message.
///
/// Ordered policy, first match wins:
/// 1. Tutor messages use the profile's target language (the tutor speaks the
///    language being practiced), falling back to English.
/// 2. User messages use the detected language of the text when known.
/// 3. Undetected user text containing any non-ASCII character uses the
///    target language when present (accented or non-Latin input is more
///    likely the practiced language than the native one).
/// 4. Otherwise the native language, else English.
#[must_use]
pub fn select_language(text: &str, sender: Sender, profile: &UserProfile) -> LangCode {
    select_with(text, sender, profile, super::detect)
}

fn select_with(
    text: &str,
    sender: Sender,
    profile: &UserProfile,
    detect: impl Fn(&str) -> Option<LangCode>,
) -> LangCode {
    if sender == Sender::Bot {
        return profile.target_language.unwrap_or(LangCode::En);
    }

    if let Some(code) = detect(text) {
        return code;
    }

    if !text.is_ascii()
        && let Some(target) = profile.target_language
    {
        return target;
    }

    profile.native_language.unwrap_or(LangCode::En)
}
