//! Configuration file parsing.
//!
//! Parses a TOML file into a `RawConfig` whose fields are all optional; resolution against
//! defaults and the file location happens afterwards.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::ConfigError;

/// Raw configuration as parsed directly from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// Index storage section.
    pub index: Option<RawIndexSettings>,
    /// Query section.
    pub search: Option<RawSearchSettings>,
    /// Highlighting section.
    pub highlight: Option<RawHighlightSettings>,
}

/// Raw `[index]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIndexSettings {
    /// Directory holding the `index/` tree; may be relative or start with `~`.
    pub root: Option<String>,
    /// Memory budget handed to each index writer.
    pub writer_heap_bytes: Option<usize>,
    /// Locale used for natural-language analysis.
    pub locale: Option<String>,
}

/// Raw `[search]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSearchSettings {
    /// Number of hits returned when a query sets no limit.
    pub default_limit: Option<usize>,
}

/// Raw `[highlight]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawHighlightSettings {
    /// Marker inserted before a matched term.
    pub pre_tag: Option<String>,
    /// Marker inserted after a matched term.
    pub post_tag: Option<String>,
    /// Target fragment length in characters.
    pub fragment_size: Option<usize>,
    /// Maximum number of fragments per field.
    pub max_fragments: Option<usize>,
    /// Lines of context around a matched line in code fields.
    pub context_lines: Option<usize>,
}

/// Parses a configuration file from disk.
pub fn parse_config_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config_str(&contents, path)
}

/// Parses configuration from a TOML string.
///
/// The `path` parameter is used for error reporting.
pub fn parse_config_str(contents: &str, path: &Path) -> Result<RawConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}
