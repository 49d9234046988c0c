//! Locale handling for natural-language analysis.

/// Language codes and the analyzer language each selects.
const LANGUAGES: &[(&str, &str)] = &[
    ("ar", "arabic"),
    ("da", "danish"),
    ("de", "german"),
    ("el", "greek"),
    ("en", "english"),
    ("es", "spanish"),
    ("fi", "finnish"),
    ("fr", "french"),
    ("hu", "hungarian"),
    ("it", "italian"),
    ("nl", "dutch"),
    ("no", "norwegian"),
    ("nb", "norwegian"),
    ("pt", "portuguese"),
    ("ro", "romanian"),
    ("ru", "russian"),
    ("sv", "swedish"),
    ("ta", "tamil"),
    ("tr", "turkish"),
];

/// Maps a locale such as `de`, `de_DE`, `en-GB` or `german` to its analyzer language name.
///
/// Returns `None` for locales without language-specific analysis.
pub fn language_for_locale(locale: &str) -> Option<&'static str> {
    let lowered = locale.trim().to_lowercase();
    let code = lowered.split(['_', '-', '.']).next().unwrap_or_default();
    LANGUAGES
        .iter()
        .find(|(short, name)| *short == code || *name == code)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes() {
        assert_eq!(language_for_locale("en"), Some("english"));
        assert_eq!(language_for_locale("de_DE"), Some("german"));
        assert_eq!(language_for_locale("es-ES"), Some("spanish"));
        assert_eq!(language_for_locale("pt_BR.UTF-8"), Some("portuguese"));
    }

    #[test]
    fn test_language_names() {
        assert_eq!(language_for_locale("German"), Some("german"));
        assert_eq!(language_for_locale(" english "), Some("english"));
    }

    #[test]
    fn test_unknown_locale() {
        assert_eq!(language_for_locale("tlh"), None);
        assert_eq!(language_for_locale(""), None);
    }
}
