//! Error types for the scm-search-index crate.

use std::{io, path::PathBuf};

use scm_search_document::DocumentError;
use scm_search_query::QueryError;
use thiserror::Error;

/// Errors that can occur when working with search indices.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Failed to open or create an index.
    #[error("failed to open index at {path}: {message}")]
    OpenIndex {
        /// Path to the index directory.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The index on disk was written with a different field layout.
    #[error("index at {path} has an incompatible schema; clear it and re-index")]
    SchemaMismatch {
        /// Path to the index directory.
        path: PathBuf,
    },

    /// Failed to write to an index.
    #[error("failed to write to index: {0}")]
    Write(String),

    /// Failed to commit changes to an index.
    #[error("failed to commit index: {0}")]
    Commit(String),

    /// Failed to execute a search.
    #[error("search failed: {0}")]
    Search(String),

    /// A mutation was attempted while no writer was open.
    #[error("index writer is not open")]
    WriterClosed,

    /// A single result was requested but several documents matched.
    #[error("expected at most one result, found {count}")]
    TooManyResults {
        /// Number of permitted matches.
        count: u64,
    },

    /// The principal may not search the requested type.
    #[error("not permitted to search {type_name}")]
    Unauthorized {
        /// Index-facing type name.
        type_name: String,
    },

    /// No searchable type is registered under the requested name.
    #[error("unknown searchable type: {0}")]
    UnknownType(String),

    /// Two Rust types map to the same index-facing name.
    #[error("type name '{name}' of {requested} is already registered for {existing}")]
    DuplicateType {
        /// Index-facing type name.
        name: String,
        /// Rust type registered first.
        existing: &'static str,
        /// Rust type that was rejected.
        requested: &'static str,
    },

    /// The query string could not be parsed or compiled.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// An object could not be described or converted.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The version log could not be read or written.
    #[error("version log {path}: {message}")]
    Log {
        /// Path of the log file.
        path: PathBuf,
        /// Error message.
        message: String,
    },
}

impl IndexError {
    /// Creates an `OpenIndex` error from a path and Tantivy error.
    pub(crate) fn open_index(path: PathBuf, source: &tantivy::TantivyError) -> Self {
        Self::OpenIndex {
            path,
            message: source.to_string(),
        }
    }

    /// Creates a `Write` error from a Tantivy error.
    pub(crate) fn write(source: &tantivy::TantivyError) -> Self {
        Self::Write(source.to_string())
    }

    /// Creates a `Commit` error from a Tantivy error.
    pub(crate) fn commit(source: &tantivy::TantivyError) -> Self {
        Self::Commit(source.to_string())
    }

    /// Creates a `Search` error from a Tantivy error.
    pub(crate) fn search(source: &tantivy::TantivyError) -> Self {
        Self::Search(source.to_string())
    }
}
