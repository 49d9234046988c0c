//! Configuration for the repository search engine.
//!
//! Settings are read from a single TOML file with three sections:
//!
//! ```toml
//! [index]
//! root = "~/.local/share/scm-search"
//! writer_heap_bytes = 50000000
//! locale = "en"
//!
//! [search]
//! default_limit = 10
//!
//! [highlight]
//! pre_tag = "<|[[--"
//! post_tag = "--]]|>"
//! fragment_size = 120
//! max_fragments = 5
//! context_lines = 1
//! ```
//!
//! Every key is optional. A relative `root` is resolved against the directory holding the
//! file; without a `root`, indices live in the platform data directory.

#![warn(missing_docs)]

mod error;
mod locale;
mod parse;
mod resolve;
mod validate;

use std::path::{Path, PathBuf};

pub use error::ConfigError;
pub use locale::language_for_locale;
pub use parse::{
    RawConfig, RawHighlightSettings, RawIndexSettings, RawSearchSettings, parse_config_file,
    parse_config_str,
};
pub use resolve::{default_root, resolve_root};
use serde::{Deserialize, Serialize};
pub use validate::{ConfigWarning, MIN_WRITER_HEAP_BYTES};
use validate::validate_config;

/// Fully resolved search configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    /// Index storage settings.
    pub index: IndexSettings,
    /// Query settings.
    pub search: SearchSettings,
    /// Highlighting settings.
    pub highlight: HighlightSettings,
    /// File the configuration was loaded from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the default configuration; an unreadable or malformed one is an
    /// error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = parse_config_file(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut config = Self::from_raw(raw, base)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Builds a configuration from TOML text, resolving a relative root against `base_dir`.
    pub fn from_toml_str(contents: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let raw = parse_config_str(contents, &base_dir.join("<inline>"))?;
        Self::from_raw(raw, base_dir)
    }

    /// Builds a configuration with default settings and the given index root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            index: IndexSettings {
                root: root.into(),
                ..IndexSettings::default()
            },
            ..Self::default()
        }
    }

    /// Applies a parsed file on top of the defaults.
    fn from_raw(raw: RawConfig, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(index) = raw.index {
            if let Some(root) = index.root {
                config.index.root = resolve_root(&root, base_dir)?;
            }
            if let Some(bytes) = index.writer_heap_bytes {
                config.index.writer_heap_bytes = bytes;
            }
            config.index.locale = index.locale.or(config.index.locale);
        }
        if let Some(search) = raw.search
            && let Some(limit) = search.default_limit
        {
            config.search.default_limit = limit;
        }
        if let Some(highlight) = raw.highlight {
            let target = &mut config.highlight;
            if let Some(tag) = highlight.pre_tag {
                target.pre_tag = tag;
            }
            if let Some(tag) = highlight.post_tag {
                target.post_tag = tag;
            }
            target.fragment_size = highlight.fragment_size.unwrap_or(target.fragment_size);
            target.max_fragments = highlight.max_fragments.unwrap_or(target.max_fragments);
            target.context_lines = highlight.context_lines.unwrap_or(target.context_lines);
        }

        Ok(config)
    }

    /// Validates the configuration and returns any warnings.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        validate_config(self)
    }

    /// Serializes the effective settings to TOML.
    pub fn settings_to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Index storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory holding the `index/` tree.
    pub root: PathBuf,
    /// Memory budget handed to each index writer.
    pub writer_heap_bytes: usize,
    /// Locale for natural-language analysis; `None` selects the generic analyzer.
    pub locale: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            root: default_root().unwrap_or_else(|_| PathBuf::from(".scm-search")),
            writer_heap_bytes: 50_000_000,
            locale: None,
        }
    }
}

/// Query settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Number of hits returned when a query sets no limit.
    pub default_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_limit: 10 }
    }
}

/// Highlighting settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HighlightSettings {
    /// Marker inserted before a matched term.
    pub pre_tag: String,
    /// Marker inserted after a matched term.
    pub post_tag: String,
    /// Target fragment length in characters for natural-language fields.
    pub fragment_size: usize,
    /// Maximum number of fragments per field.
    pub max_fragments: usize,
    /// Lines of context around a matched line in code fields.
    pub context_lines: usize,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            pre_tag: String::from("<|[[--"),
            post_tag: String::from("--]]|>"),
            fragment_size: 120,
            max_fragments: 5,
            context_lines: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.index.writer_heap_bytes, 50_000_000);
        assert!(config.index.locale.is_none());
        assert_eq!(config.highlight.pre_tag, "<|[[--");
        assert_eq!(config.highlight.post_tag, "--]]|>");
        assert!(config.source.is_none());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_toml_str(
            "[highlight]\npre_tag = \"<b>\"\n[search]\ndefault_limit = 3\n",
            dir.path(),
        )
        .unwrap();
        assert_eq!(config.highlight.pre_tag, "<b>");
        assert_eq!(config.highlight.post_tag, "--]]|>");
        assert_eq!(config.highlight.fragment_size, 120);
        assert_eq!(config.search.default_limit, 3);
    }

    #[test]
    fn test_relative_root_resolves_against_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("search.toml");
        fs::create_dir_all(dir.path().join("conf")).unwrap();
        fs::write(&path, "[index]\nroot = \"data\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.index.root, dir.path().join("conf").join("data"));
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.source.is_none());
        assert_eq!(config.search.default_limit, 10);
    }

    #[test]
    fn test_with_root() {
        let config = Config::with_root("/srv/search");
        assert_eq!(config.index.root, Path::new("/srv/search"));
        assert_eq!(config.search.default_limit, 10);
    }

    #[test]
    fn test_settings_to_toml_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_root(dir.path().join("idx"));
        config.index.locale = Some("de".into());
        let rendered = config.settings_to_toml().unwrap();
        assert!(rendered.contains("[highlight]"));
        let reparsed = Config::from_toml_str(&rendered, dir.path()).unwrap();
        assert_eq!(reparsed.index.root, config.index.root);
        assert_eq!(reparsed.index.locale.as_deref(), Some("de"));
        assert_eq!(reparsed.highlight, config.highlight);
    }
}
