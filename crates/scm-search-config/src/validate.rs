//! Configuration validation.
//!
//! Reports settings that load fine but will not behave the way the user likely expects.

use std::fmt;

use crate::{Config, locale::language_for_locale};

/// Smallest writer budget the index accepts for a single indexing thread.
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

/// A non-fatal warning about the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The locale has no language-specific analysis; the generic analyzer is used.
    UnknownLocale {
        /// The configured locale.
        locale: String,
    },
    /// The writer budget is below what a single indexing thread needs.
    WriterHeapTooSmall {
        /// The configured budget.
        bytes: usize,
    },
    /// Queries without an explicit limit return nothing.
    ZeroDefaultLimit,
    /// A highlight marker is empty, so matches are not visibly marked.
    EmptyHighlightMarker {
        /// Which marker is empty (`pre_tag` or `post_tag`).
        marker: &'static str,
    },
    /// Fragment size of zero; natural-language fragments collapse to the matched term.
    ZeroFragmentSize,
    /// No fragments are produced for highlighted fields.
    ZeroMaxFragments,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLocale { locale } => {
                write!(f, "locale '{locale}' is not supported, using generic analysis")
            }
            Self::WriterHeapTooSmall { bytes } => write!(
                f,
                "writer_heap_bytes {bytes} is below the minimum of {MIN_WRITER_HEAP_BYTES}"
            ),
            Self::ZeroDefaultLimit => write!(f, "search.default_limit is 0"),
            Self::EmptyHighlightMarker { marker } => write!(f, "highlight.{marker} is empty"),
            Self::ZeroFragmentSize => write!(f, "highlight.fragment_size is 0"),
            Self::ZeroMaxFragments => write!(f, "highlight.max_fragments is 0"),
        }
    }
}

/// Validates the configuration and returns any warnings.
pub fn validate_config(config: &Config) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if let Some(locale) = &config.index.locale
        && language_for_locale(locale).is_none()
    {
        warnings.push(ConfigWarning::UnknownLocale {
            locale: locale.clone(),
        });
    }
    if config.index.writer_heap_bytes < MIN_WRITER_HEAP_BYTES {
        warnings.push(ConfigWarning::WriterHeapTooSmall {
            bytes: config.index.writer_heap_bytes,
        });
    }
    if config.search.default_limit == 0 {
        warnings.push(ConfigWarning::ZeroDefaultLimit);
    }
    if config.highlight.pre_tag.is_empty() {
        warnings.push(ConfigWarning::EmptyHighlightMarker { marker: "pre_tag" });
    }
    if config.highlight.post_tag.is_empty() {
        warnings.push(ConfigWarning::EmptyHighlightMarker { marker: "post_tag" });
    }
    if config.highlight.fragment_size == 0 {
        warnings.push(ConfigWarning::ZeroFragmentSize);
    }
    if config.highlight.max_fragments == 0 {
        warnings.push(ConfigWarning::ZeroMaxFragments);
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_clean() {
        assert!(validate_config(&Config::default()).is_empty());
    }

    #[test]
    fn test_unknown_locale_warns() {
        let mut config = Config::default();
        config.index.locale = Some("klingon".into());
        let warnings = validate_config(&config);
        assert_eq!(
            warnings,
            vec![ConfigWarning::UnknownLocale {
                locale: "klingon".into()
            }]
        );
        assert!(warnings[0].to_string().contains("klingon"));
    }

    #[test]
    fn test_zero_values_warn() {
        let mut config = Config::default();
        config.search.default_limit = 0;
        config.highlight.max_fragments = 0;
        config.highlight.post_tag.clear();
        let warnings = validate_config(&config);
        assert!(warnings.contains(&ConfigWarning::ZeroDefaultLimit));
        assert!(warnings.contains(&ConfigWarning::ZeroMaxFragments));
        assert!(warnings.contains(&ConfigWarning::EmptyHighlightMarker { marker: "post_tag" }));
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_small_writer_heap_warns() {
        let mut config = Config::default();
        config.index.writer_heap_bytes = 1_000;
        assert_eq!(
            validate_config(&config),
            vec![ConfigWarning::WriterHeapTooSmall { bytes: 1_000 }]
        );
    }
}
