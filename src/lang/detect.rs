//! Text-language identification over whatlang's trigram model.

use super::LangCode;
use whatlang::{Detector, Lang};

/// The whatlang languages we allow the detector to choose between.
///
/// Restricting the allowlist to the supported set makes short-fragment
/// detection markedly more stable than an open 60-language classification.
const ALLOWLIST: [Lang; 6] = [
    Lang::Eng,
    Lang::Spa,
    Lang::Fra,
    Lang::Deu,
    Lang::Ita,
    Lang::Cmn,
];

/// Guess the language of a text fragment.
///
/// Returns `None` when the model cannot classify the text or classifies it
/// as something outside the supported set. Detection failure is a normal
/// outcome, not an error; this never panics.
#[must_use]
pub fn detect(text: &str) -> Option<LangCode> {
    if text.trim().is_empty() {
        return None;
    }
    let detector = Detector::with_allowlist(ALLOWLIST.to_vec());
    detector.detect_lang(text).and_then(map_lang)
}

/// Fixed lookup from whatlang's model output to a supported code.
fn map_lang(lang: Lang) -> Option<LangCode> {
    match lang {
        Lang::Eng => Some(LangCode::En),
        Lang::Spa => Some(LangCode::Es),
        Lang::Fra => Some(LangCode::Fr),
        Lang::Deu => Some(LangCode::De),
        Lang::Ita => Some(LangCode::It),
        Lang::Cmn => Some(LangCode::Zh),
        _ => None,
    }
}
