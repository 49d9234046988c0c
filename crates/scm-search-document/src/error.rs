//! Error types for schema derivation and document conversion.

use thiserror::Error;

use crate::IdError;

/// Errors that can occur when deriving a searchable type or converting an instance.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// A field was declared for indexing but has no way to read its value.
    #[error("field '{field}' of {type_name} is declared for indexing but cannot be read")]
    NonReadableField {
        /// Rust name of the indexed type.
        type_name: &'static str,
        /// Declared field name.
        field: String,
    },

    /// A field's value type has no index encoding.
    #[error("field '{field}' of {type_name} has unsupported type {value_type}")]
    UnsupportedFieldType {
        /// Rust name of the indexed type.
        type_name: &'static str,
        /// Declared field name.
        field: String,
        /// Rust name of the field's value type.
        value_type: &'static str,
    },

    /// Two fields of a type resolve to the same index name.
    #[error("field '{field}' is declared more than once for {type_name}")]
    DuplicateField {
        /// Rust name of the indexed type.
        type_name: &'static str,
        /// Duplicated field name.
        field: String,
    },

    /// Reading a field value failed during conversion.
    #[error("failed to read field '{field}' of {type_name}: {message}")]
    FieldAccess {
        /// Rust name of the indexed type.
        type_name: &'static str,
        /// Field name.
        field: String,
        /// Failure reported by the accessor.
        message: String,
    },

    /// A stored identifier could not be parsed.
    #[error(transparent)]
    InvalidId(#[from] IdError),
}
