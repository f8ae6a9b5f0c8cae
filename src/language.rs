//! Question language detection.
//!
//! Answers are generated in the language the student asked in. Only the
//! languages in [`SUPPORTED_LANGUAGES`] are reported; anything else, and
//! text too short or mixed to call reliably, resolves to English.

use tracing::{debug, warn};
use whatlang::Lang;

/// Language used when detection fails or finds an unsupported language.
pub const DEFAULT_LANGUAGE: &str = "en";

/// ISO 639-1 codes and display names of the languages answers can use.
pub const SUPPORTED_LANGUAGES: [(&str, &str); 12] = [
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("zh", "Chinese"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
    ("ru", "Russian"),
];

pub fn is_supported(code: &str) -> bool {
    language_name(code).is_some()
}

pub fn language_name(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

fn supported_code(lang: Lang) -> Option<&'static str> {
    match lang {
        Lang::Eng => Some("en"),
        Lang::Spa => Some("es"),
        Lang::Fra => Some("fr"),
        Lang::Deu => Some("de"),
        Lang::Ita => Some("it"),
        Lang::Por => Some("pt"),
        Lang::Cmn => Some("zh"),
        Lang::Jpn => Some("ja"),
        Lang::Kor => Some("ko"),
        Lang::Ara => Some("ar"),
        Lang::Hin => Some("hi"),
        Lang::Rus => Some("ru"),
        _ => None,
    }
}

/// ISO 639-1 code of the language `text` is written in.
pub fn detect_language(text: &str) -> &'static str {
    let Some(info) = whatlang::detect(text) else {
        debug!("no language detected, using {}", DEFAULT_LANGUAGE);
        return DEFAULT_LANGUAGE;
    };
    if !info.is_reliable() {
        debug!(
            detected = info.lang().code(),
            confidence = info.confidence(),
            "unreliable language detection, using {}",
            DEFAULT_LANGUAGE
        );
        return DEFAULT_LANGUAGE;
    }

    match supported_code(info.lang()) {
        Some(code) => {
            debug!(language = code, confidence = info.confidence(), "detected language");
            code
        }
        None => {
            warn!(
                detected = info.lang().code(),
                "unsupported language, using {}",
                DEFAULT_LANGUAGE
            );
            DEFAULT_LANGUAGE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_spanish_question() {
        let question = "¿Cuándo tengo que pagar la matrícula del semestre y qué ocurre \
                        si la pago con retraso después de la fecha límite?";
        assert_eq!(detect_language(question), "es");
    }

    #[test]
    fn test_detects_japanese_question() {
        assert_eq!(detect_language("授業料はいつまでに支払う必要がありますか？"), "ja");
    }

    #[test]
    fn test_unsupported_language_falls_back_to_english() {
        let hebrew = "מתי צריך לשלם את שכר הלימוד של הסמסטר הבא באוניברסיטה?";
        assert_eq!(detect_language(hebrew), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_text_without_letters_is_english() {
        assert_eq!(detect_language(""), "en");
        assert_eq!(detect_language("2024?"), "en");
    }

    #[test]
    fn test_supported_table() {
        assert!(is_supported("ko"));
        assert!(!is_supported("he"));
        assert_eq!(language_name("hi"), Some("Hindi"));
        assert_eq!(language_name("xx"), None);
        for (code, _) in SUPPORTED_LANGUAGES {
            assert_eq!(code.len(), 2);
        }
    }
}
