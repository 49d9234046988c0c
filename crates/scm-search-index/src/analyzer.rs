//! Text analysis for the search index.
//!
//! Three analyzers are registered with every index:
//! - [`TEXT_ANALYZER`]: natural language text. `SimpleTokenizer`, `LowerCaser`,
//!   `RemoveLongFilter` and, when a known locale is configured, stop words plus a stemmer.
//! - [`CODE_ANALYZER`]: identifiers and source code, split by [`CodeTokenizer`] and lowercased.
//! - [`KEYWORD_ANALYZER`]: the whole value as a single lowercased token (enums, booleans).
//!
//! Untokenized text uses Tantivy's built-in `raw` tokenizer.

use scm_search_config::{IndexSettings, language_for_locale};
use scm_search_document::{Analyzer, FieldKind, SearchableField};
use tantivy::tokenizer::{
    Language, LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer, Stemmer,
    StopWordFilter, TextAnalyzer, TokenizerManager,
};
use tracing::debug;

use crate::tokenizer::CodeTokenizer;

/// Name of the natural language analyzer.
pub const TEXT_ANALYZER: &str = "scm_text";

/// Name of the source code analyzer.
pub const CODE_ANALYZER: &str = "scm_code";

/// Name of the lowercased keyword analyzer.
pub const KEYWORD_ANALYZER: &str = "scm_keyword";

/// Name of Tantivy's untokenized analyzer.
pub const RAW_ANALYZER: &str = "raw";

/// Maximum token length in bytes before filtering.
const MAX_TOKEN_LENGTH: usize = 40;

/// How natural language text is analyzed in one index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum IndexOptions {
    /// Generic analysis without stemming.
    #[default]
    Default,
    /// Locale-aware analysis with stemming and stop words.
    NaturalLanguage {
        /// Locale such as `en`, `de_DE` or a language name.
        locale: String,
    },
}

impl IndexOptions {
    /// Creates locale-aware options.
    pub fn natural_language(locale: impl Into<String>) -> Self {
        Self::NaturalLanguage {
            locale: locale.into(),
        }
    }

    /// Derives options from index settings.
    pub fn from_settings(settings: &IndexSettings) -> Self {
        settings
            .locale
            .as_ref()
            .map_or(Self::Default, |locale| Self::natural_language(locale.clone()))
    }

    /// Returns the stemming language selected by these options.
    pub fn language(&self) -> Option<Language> {
        match self {
            Self::Default => None,
            Self::NaturalLanguage { locale } => language_for_locale(locale).and_then(parse_language),
        }
    }
}

/// Parses a language name into a Tantivy `Language`.
///
/// Accepts lowercase names matching Tantivy's `Language` enum, case-insensitively.
pub fn parse_language(name: &str) -> Option<Language> {
    match name.to_lowercase().as_str() {
        "arabic" => Some(Language::Arabic),
        "danish" => Some(Language::Danish),
        "dutch" => Some(Language::Dutch),
        "english" => Some(Language::English),
        "finnish" => Some(Language::Finnish),
        "french" => Some(Language::French),
        "german" => Some(Language::German),
        "greek" => Some(Language::Greek),
        "hungarian" => Some(Language::Hungarian),
        "italian" => Some(Language::Italian),
        "norwegian" => Some(Language::Norwegian),
        "portuguese" => Some(Language::Portuguese),
        "romanian" => Some(Language::Romanian),
        "russian" => Some(Language::Russian),
        "spanish" => Some(Language::Spanish),
        "swedish" => Some(Language::Swedish),
        "tamil" => Some(Language::Tamil),
        "turkish" => Some(Language::Turkish),
        _ => None,
    }
}

/// Builds the natural language analyzer for the given options.
///
/// Unknown locales and [`IndexOptions::Default`] fall back to the generic pipeline.
pub fn create(options: &IndexOptions) -> TextAnalyzer {
    let Some(language) = options.language() else {
        if let IndexOptions::NaturalLanguage { locale } = options {
            debug!(locale, "no stemmer for locale, using generic analyzer");
        }
        return generic_analyzer();
    };
    match StopWordFilter::new(language) {
        Some(stop_words) => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
            .filter(stop_words)
            .filter(Stemmer::new(language))
            .build(),
        None => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
            .filter(Stemmer::new(language))
            .build(),
    }
}

/// Generic analyzer: simple tokenizer, lowercasing and long-token removal.
fn generic_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
        .build()
}

/// Builds the source code analyzer.
pub fn code_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(CodeTokenizer)
        .filter(LowerCaser)
        .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
        .build()
}

/// Builds the keyword analyzer.
pub fn keyword_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(RawTokenizer::default())
        .filter(LowerCaser)
        .build()
}

/// Registers all custom analyzers with a tokenizer manager.
pub fn register(tokenizers: &TokenizerManager, options: &IndexOptions) {
    tokenizers.register(TEXT_ANALYZER, create(options));
    tokenizers.register(CODE_ANALYZER, code_analyzer());
    tokenizers.register(KEYWORD_ANALYZER, keyword_analyzer());
}

/// Returns the analyzer name used to index a field.
pub fn analyzer_name(field: &SearchableField) -> &'static str {
    match field.kind {
        FieldKind::Text if field.tokenized => match field.analyzer {
            Analyzer::Default => TEXT_ANALYZER,
            Analyzer::Code => CODE_ANALYZER,
        },
        FieldKind::Text => RAW_ANALYZER,
        FieldKind::Boolean | FieldKind::Enum => KEYWORD_ANALYZER,
        FieldKind::Integer | FieldKind::Timestamp => RAW_ANALYZER,
    }
}

#[cfg(test)]
mod test {
    use tantivy::tokenizer::TokenStream;

    use super::*;

    fn tokens(mut analyzer: TextAnalyzer, text: &str) -> Vec<String> {
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while let Some(token) = stream.next() {
            tokens.push(token.text.clone());
        }
        tokens
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!(parse_language("English"), Some(Language::English));
        assert_eq!(parse_language("FRENCH"), Some(Language::French));
        assert_eq!(parse_language("klingon"), None);
    }

    #[test]
    fn default_options_do_not_stem() {
        let analyzer = create(&IndexOptions::Default);
        assert_eq!(tokens(analyzer, "Running HANDLERS"), ["running", "handlers"]);
    }

    #[test]
    fn english_locale_stems_and_drops_stop_words() {
        let analyzer = create(&IndexOptions::natural_language("en"));
        assert_eq!(tokens(analyzer, "the running handlers"), ["run", "handler"]);
    }

    #[test]
    fn german_locale_stems() {
        let analyzer = create(&IndexOptions::natural_language("de_DE"));
        assert_eq!(tokens(analyzer, "Katzen"), ["katz"]);
    }

    #[test]
    fn unknown_locale_falls_back() {
        let analyzer = create(&IndexOptions::natural_language("tlh"));
        assert_eq!(tokens(analyzer, "Running"), ["running"]);
    }

    #[test]
    fn long_tokens_are_removed() {
        let long_token = "a".repeat(50);
        let text = format!("short {long_token} word");
        assert_eq!(tokens(create(&IndexOptions::Default), &text), ["short", "word"]);
    }

    #[test]
    fn code_analyzer_splits_identifiers() {
        assert_eq!(
            tokens(code_analyzer(), "parseHttpRequest(input_buffer)"),
            ["parse", "http", "request", "input", "buffer"]
        );
    }

    #[test]
    fn keyword_analyzer_keeps_whole_value() {
        assert_eq!(tokens(keyword_analyzer(), "AlPaCa Farm"), ["alpaca farm"]);
    }

    #[test]
    fn options_from_settings() {
        let mut settings = IndexSettings::default();
        assert_eq!(IndexOptions::from_settings(&settings), IndexOptions::Default);
        settings.locale = Some("es".into());
        assert_eq!(
            IndexOptions::from_settings(&settings),
            IndexOptions::natural_language("es")
        );
    }
}
