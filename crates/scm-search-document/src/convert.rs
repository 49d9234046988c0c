//! Flat documents produced from indexed objects.

use crate::FieldValue;

/// One property value of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentField {
    /// Index-facing field name.
    pub name: String,
    /// Extracted value.
    pub value: FieldValue,
}

/// The indexable content of one object.
///
/// Holds a value for every declared field that was present on the instance. Identity and
/// permission bookkeeping are attached by the index when the document is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Index-facing name of the source type.
    type_name: String,
    /// Present field values in declaration order.
    fields: Vec<DocumentField>,
}

impl Document {
    /// Creates a document.
    pub fn new(type_name: String, fields: Vec<DocumentField>) -> Self {
        Self { type_name, fields }
    }

    /// Returns the index-facing type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the field values.
    pub fn fields(&self) -> &[DocumentField] {
        &self.fields
    }

    /// Returns the value of a field, if present.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}
