//! Error types for search configuration.

use std::{io, path::PathBuf};

use thiserror::Error;
use toml::{de, ser};

/// Errors raised while loading search settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    #[error("cannot read search settings {path}: {source}")]
    ReadFile {
        /// Settings file.
        path: PathBuf,
        /// I/O failure.
        source: io::Error,
    },

    /// The settings file is not valid TOML or has mistyped values.
    #[error("invalid search settings in {path}: {source}")]
    ParseToml {
        /// Settings file.
        path: PathBuf,
        /// TOML decoding failure.
        source: de::Error,
    },

    /// Failed to render settings as TOML.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] ser::Error),

    /// A `~` root was configured but the home directory is unknown.
    #[error("cannot expand '~' in index root: home directory unknown")]
    NoHomeDirectory,

    /// No index root was configured and no platform data directory is available.
    #[error("no index root configured and no platform data directory available")]
    NoDataDirectory,
}
