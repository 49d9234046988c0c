//! Mapping of searchable types onto Tantivy schemas.
//!
//! Every index carries bookkeeping fields next to the fields of its type:
//! - `_uid`: type plus canonical id, the upsert key (string)
//! - `_id`: canonical [`Id`](scm_search_document::Id) (string, stored)
//! - `_type`: type name (string, stored)
//! - `_permission`: permission tag (string, stored, fast)
//! - `_scope`: one `scopeType:scopeId` term per scope (string)
//!
//! Text fields use the analyzer chosen by [`analyzer_name`]; integers and timestamps are
//! indexed `i64` fast columns so both exact and range queries work.

use std::sync::Arc;

use scm_search_document::{FieldKind, SearchableField, SearchableType};
use tantivy::schema::{
    FAST, Field, IndexRecordOption, NumericOptions, STORED, STRING, Schema, TextFieldIndexing,
    TextOptions,
};

use crate::analyzer::analyzer_name;

/// Upsert key field.
pub const UID_FIELD: &str = "_uid";
/// Canonical id field.
pub const ID_FIELD: &str = "_id";
/// Type tag field.
pub const TYPE_FIELD: &str = "_type";
/// Permission tag field.
pub const PERMISSION_FIELD: &str = "_permission";
/// Scope tag field.
pub const SCOPE_FIELD: &str = "_scope";

/// A type field mapped to its Tantivy field.
#[derive(Debug, Clone)]
pub struct MappedField {
    /// Tantivy field handle.
    pub field: Field,
    /// Descriptor from the searchable type.
    pub descriptor: SearchableField,
    /// Name of the analyzer the field is indexed with.
    pub analyzer: &'static str,
}

/// Handles to all fields of one type's index.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    /// The underlying Tantivy schema.
    schema: Schema,
    /// Type this schema was built for.
    searchable: Arc<SearchableType>,
    /// Upsert key.
    pub uid: Field,
    /// Canonical id.
    pub id: Field,
    /// Type tag.
    pub type_name: Field,
    /// Permission tag.
    pub permission: Field,
    /// Scope tags.
    pub scope: Field,
    /// Type fields in declaration order.
    fields: Vec<MappedField>,
}

impl IndexSchema {
    /// Builds the schema for a searchable type.
    ///
    /// Building is deterministic: the same type always yields equal schemas and field handles.
    pub fn new(searchable: Arc<SearchableType>) -> Self {
        let mut builder = Schema::builder();

        let uid = builder.add_text_field(UID_FIELD, STRING);
        let id = builder.add_text_field(ID_FIELD, STRING | STORED);
        let type_name = builder.add_text_field(TYPE_FIELD, STRING | STORED);
        let permission = builder.add_text_field(PERMISSION_FIELD, STRING | STORED | FAST);
        let scope = builder.add_text_field(SCOPE_FIELD, STRING);

        let fields = searchable
            .fields()
            .iter()
            .map(|descriptor| {
                let analyzer = analyzer_name(descriptor);
                let field = match descriptor.kind {
                    FieldKind::Integer | FieldKind::Timestamp => {
                        builder.add_i64_field(&descriptor.name, numeric_options(descriptor))
                    }
                    FieldKind::Text | FieldKind::Boolean | FieldKind::Enum => {
                        builder.add_text_field(&descriptor.name, text_options(descriptor, analyzer))
                    }
                };
                MappedField {
                    field,
                    descriptor: descriptor.clone(),
                    analyzer,
                }
            })
            .collect();

        Self {
            schema: builder.build(),
            searchable,
            uid,
            id,
            type_name,
            permission,
            scope,
            fields,
        }
    }

    /// Returns the Tantivy schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the searchable type.
    pub fn searchable(&self) -> &Arc<SearchableType> {
        &self.searchable
    }

    /// Returns all mapped type fields.
    pub fn fields(&self) -> &[MappedField] {
        &self.fields
    }

    /// Finds a mapped field by name.
    pub fn field(&self, name: &str) -> Option<&MappedField> {
        self.fields.iter().find(|f| f.descriptor.name == name)
    }

    /// Returns the fields searched by unqualified terms.
    pub fn default_fields(&self) -> impl Iterator<Item = &MappedField> {
        self.fields.iter().filter(|f| f.descriptor.default_query)
    }
}

/// Text options for a text, boolean or enum field.
fn text_options(descriptor: &SearchableField, analyzer: &'static str) -> TextOptions {
    let mut options = TextOptions::default();
    if descriptor.searchable {
        let record = if descriptor.tokenized {
            IndexRecordOption::WithFreqsAndPositions
        } else {
            IndexRecordOption::Basic
        };
        options = options.set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(analyzer)
                .set_index_option(record),
        );
    }
    if descriptor.stored {
        options = options.set_stored();
    }
    options
}

/// Numeric options for an integer or timestamp field.
fn numeric_options(descriptor: &SearchableField) -> NumericOptions {
    let mut options = NumericOptions::default();
    if descriptor.searchable {
        options = options.set_indexed().set_fast();
    }
    if descriptor.stored {
        options = options.set_stored();
    }
    options
}

#[cfg(test)]
mod tests {
    use scm_search_document::{
        Analyzer, FieldOptions, Indexable, Stored, TypeBuilder, derive_schema,
    };
    use tantivy::schema::FieldType;

    use super::*;
    use crate::analyzer::{CODE_ANALYZER, KEYWORD_ANALYZER, RAW_ANALYZER, TEXT_ANALYZER};

    struct Commit {
        message: String,
        revision: String,
        author: String,
        lines: i32,
        signed: bool,
        source: String,
    }

    impl Indexable for Commit {
        fn describe(builder: &mut TypeBuilder<Self>) {
            builder
                .field("message", |c: &Self| c.message.clone(), FieldOptions::new().default_query())
                .field("revision", |c: &Self| c.revision.clone(), FieldOptions::new().untokenized())
                .field("author", |c: &Self| c.author.clone(), FieldOptions::new().stored_only())
                .field("lines", |c: &Self| c.lines, FieldOptions::new().stored(Stored::No))
                .field("signed", |c: &Self| c.signed, FieldOptions::new())
                .field(
                    "source",
                    |c: &Self| c.source.clone(),
                    FieldOptions::new().analyzer(Analyzer::Code),
                );
        }
    }

    fn schema() -> IndexSchema {
        let typed = derive_schema::<Commit>().unwrap();
        IndexSchema::new(Arc::clone(typed.searchable_type()))
    }

    #[test]
    fn bookkeeping_fields_exist() {
        let schema = schema();
        for name in [UID_FIELD, ID_FIELD, TYPE_FIELD, PERMISSION_FIELD, SCOPE_FIELD] {
            assert!(schema.schema().get_field(name).is_ok(), "missing {name}");
        }
        let permission = schema.schema().get_field_entry(schema.permission);
        assert!(permission.is_fast());
    }

    #[test]
    fn analyzers_follow_field_options() {
        let schema = schema();
        assert_eq!(schema.field("message").unwrap().analyzer, TEXT_ANALYZER);
        assert_eq!(schema.field("revision").unwrap().analyzer, RAW_ANALYZER);
        assert_eq!(schema.field("signed").unwrap().analyzer, KEYWORD_ANALYZER);
        assert_eq!(schema.field("source").unwrap().analyzer, CODE_ANALYZER);
    }

    #[test]
    fn stored_only_field_is_not_indexed() {
        let schema = schema();
        let author = schema.field("author").unwrap().field;
        let entry = schema.schema().get_field_entry(author);
        assert!(entry.is_stored());
        assert!(!entry.is_indexed());
    }

    #[test]
    fn numbers_are_fast_i64_columns() {
        let schema = schema();
        let lines = schema.field("lines").unwrap().field;
        let entry = schema.schema().get_field_entry(lines);
        assert!(matches!(entry.field_type(), FieldType::I64(_)));
        assert!(entry.is_fast());
        assert!(entry.is_indexed());
        assert!(!entry.is_stored());
    }

    #[test]
    fn default_fields_are_filtered() {
        let schema = schema();
        let names: Vec<&str> = schema
            .default_fields()
            .map(|f| f.descriptor.name.as_str())
            .collect();
        assert_eq!(names, ["message"]);
    }

    #[test]
    fn building_is_deterministic() {
        assert_eq!(schema().schema(), schema().schema());
    }
}
