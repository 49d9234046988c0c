//! Conversion between documents and Tantivy documents.

use scm_search_document::{
    Document, DocumentError, FieldKind, FieldValue, Id, IdError, escape_part,
};
use tantivy::{
    TantivyDocument, Term,
    schema::{Field, Value},
};

use crate::{
    IndexError,
    schema::{IndexSchema, MappedField},
};

/// A document ready to be upserted.
#[derive(Debug, Clone)]
pub struct EncodedDocument {
    /// Upsert key: every document with this `_uid` term is replaced.
    pub key: Term,
    /// The Tantivy document.
    pub document: TantivyDocument,
}

/// Returns the upsert key value for a document of `type_name`.
pub fn uid(type_name: &str, id: &Id) -> String {
    format!("{type_name}:{id}")
}

/// Returns the `_scope` term value for a scope.
pub fn scope_tag(scope_type: &str, scope_id: &str) -> String {
    format!("{}:{}", escape_part(scope_type), escape_part(scope_id))
}

/// Returns the term selecting one document by id.
pub fn uid_term(schema: &IndexSchema, id: &Id) -> Term {
    Term::from_field_text(schema.uid, &uid(schema.searchable().name(), id))
}

/// Returns the term selecting every document of the schema's type.
pub fn type_term(schema: &IndexSchema) -> Term {
    Term::from_field_text(schema.type_name, schema.searchable().name())
}

/// Returns the term selecting every document within a scope.
pub fn scope_term(schema: &IndexSchema, scope_type: &str, scope_id: &str) -> Term {
    Term::from_field_text(schema.scope, &scope_tag(scope_type, scope_id))
}

/// Encodes a converted document together with its bookkeeping fields.
pub fn encode(
    schema: &IndexSchema,
    id: &Id,
    permission: Option<&str>,
    document: &Document,
) -> Result<EncodedDocument, IndexError> {
    let type_name = schema.searchable().name();
    if document.type_name() != type_name {
        return Err(IndexError::Write(format!(
            "document of type {} cannot be stored in an index of type {type_name}",
            document.type_name()
        )));
    }
    // An empty main id has no canonical form that parses back.
    if id.main().is_empty() {
        return Err(DocumentError::from(IdError::EmptyMain).into());
    }

    let mut doc = TantivyDocument::new();
    let uid = uid(type_name, id);
    doc.add_text(schema.uid, &uid);
    doc.add_text(schema.id, id.to_string());
    doc.add_text(schema.type_name, type_name);
    if let Some(permission) = permission {
        doc.add_text(schema.permission, permission);
    }
    for (scope_type, scope_id) in id.scopes() {
        doc.add_text(schema.scope, scope_tag(scope_type, scope_id));
    }

    for entry in document.fields() {
        let mapped = schema.field(&entry.name).ok_or_else(|| {
            IndexError::Write(format!("field {} is not part of type {type_name}", entry.name))
        })?;
        add_value(&mut doc, mapped.field, &entry.value);
    }

    Ok(EncodedDocument {
        key: Term::from_field_text(schema.uid, &uid),
        document: doc,
    })
}

/// Adds one property value in its index encoding.
fn add_value(doc: &mut TantivyDocument, field: Field, value: &FieldValue) {
    match value {
        FieldValue::Text(text) | FieldValue::Enum(text) => doc.add_text(field, text),
        FieldValue::Integer(n) | FieldValue::Timestamp(n) => doc.add_i64(field, *n),
        FieldValue::Boolean(flag) => doc.add_text(field, if *flag { "true" } else { "false" }),
    }
}

/// Reads the stored id of a document.
pub fn stored_id(schema: &IndexSchema, doc: &TantivyDocument) -> Option<Id> {
    let raw = doc.get_first(schema.id).and_then(|v| v.as_str())?;
    Id::parse(raw).ok()
}

/// Reads the stored value of a field back into its property value.
pub fn stored_value(mapped: &MappedField, doc: &TantivyDocument) -> Option<FieldValue> {
    let value = doc.get_first(mapped.field)?;
    match mapped.descriptor.kind {
        FieldKind::Text => value.as_str().map(|s| FieldValue::Text(s.to_string())),
        FieldKind::Enum => value.as_str().map(|s| FieldValue::Enum(s.to_string())),
        FieldKind::Boolean => value.as_str().map(|s| FieldValue::Boolean(s == "true")),
        FieldKind::Integer => value.as_i64().map(FieldValue::Integer),
        FieldKind::Timestamp => value.as_i64().map(FieldValue::Timestamp),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::{Duration, SystemTime, UNIX_EPOCH},
    };

    use scm_search_document::{FieldOptions, Indexable, IndexedEnum, TypeBuilder, derive_schema};

    use super::*;

    #[derive(Clone, Copy)]
    enum Visibility {
        Public,
    }

    impl IndexedEnum for Visibility {
        fn variant_name(&self) -> &'static str {
            match self {
                Self::Public => "PUBLIC",
            }
        }
    }

    struct Repo {
        name: String,
        stars: i32,
        archived: bool,
        created: SystemTime,
        visibility: Visibility,
        description: Option<String>,
    }

    impl Indexable for Repo {
        fn describe(builder: &mut TypeBuilder<Self>) {
            builder
                .field("name", |r: &Self| r.name.clone(), FieldOptions::new())
                .field("stars", |r: &Self| r.stars, FieldOptions::new())
                .field("archived", |r: &Self| r.archived, FieldOptions::new())
                .field("created", |r: &Self| r.created, FieldOptions::new())
                .enum_field("visibility", |r: &Self| r.visibility, FieldOptions::new())
                .optional("description", |r: &Self| r.description.clone(), FieldOptions::new());
        }
    }

    fn fixture() -> (IndexSchema, Document) {
        let typed = derive_schema::<Repo>().unwrap();
        let schema = IndexSchema::new(Arc::clone(typed.searchable_type()));
        let doc = typed
            .convert(&Repo {
                name: "heart-of-gold".into(),
                stars: 42,
                archived: false,
                created: UNIX_EPOCH + Duration::from_millis(1_500),
                visibility: Visibility::Public,
                description: None,
            })
            .unwrap();
        (schema, doc)
    }

    #[test]
    fn stored_values_round_trip() {
        let (schema, doc) = fixture();
        let encoded = encode(&schema, &Id::of("42"), None, &doc).unwrap();
        let get = |name: &str| stored_value(schema.field(name).unwrap(), &encoded.document);

        assert_eq!(get("name"), Some(FieldValue::Text("heart-of-gold".into())));
        assert_eq!(get("stars"), Some(FieldValue::Integer(42)));
        assert_eq!(get("archived"), Some(FieldValue::Boolean(false)));
        assert_eq!(get("created"), Some(FieldValue::Timestamp(1_500)));
        assert_eq!(get("visibility"), Some(FieldValue::Enum("PUBLIC".into())));
        assert_eq!(get("description"), None);
    }

    #[test]
    fn bookkeeping_is_stamped() {
        let (schema, doc) = fixture();
        let id = Id::of("42").and("repository", "hog");
        let encoded = encode(&schema, &id, Some("repository:read:hog"), &doc).unwrap();

        assert_eq!(stored_id(&schema, &encoded.document), Some(id.clone()));
        let permission = encoded
            .document
            .get_first(schema.permission)
            .and_then(|v| v.as_str());
        assert_eq!(permission, Some("repository:read:hog"));
        let scopes: Vec<&str> = encoded
            .document
            .get_all(schema.scope)
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(scopes, ["repository:hog"]);
        assert_eq!(encoded.key, uid_term(&schema, &id));
    }

    #[test]
    fn missing_permission_adds_no_tag() {
        let (schema, doc) = fixture();
        let encoded = encode(&schema, &Id::of("1"), None, &doc).unwrap();
        assert!(encoded.document.get_first(schema.permission).is_none());
    }

    #[test]
    fn foreign_document_is_rejected() {
        let (schema, _) = fixture();
        let foreign = Document::new("user".into(), Vec::new());
        let err = encode(&schema, &Id::of("1"), None, &foreign).unwrap_err();
        assert!(err.to_string().contains("user"));
    }

    #[test]
    fn empty_id_is_rejected() {
        let (schema, doc) = fixture();
        let err = encode(&schema, &Id::of(""), None, &doc).unwrap_err();
        assert!(matches!(
            err,
            IndexError::Document(DocumentError::InvalidId(IdError::EmptyMain))
        ));
    }

    #[test]
    fn scope_tags_do_not_collide() {
        assert_ne!(scope_tag("repository", "a:b"), scope_tag("repository:a", "b"));
        assert_eq!(scope_tag("repository", "a:b"), r"repository:a\:b");
        assert_eq!(scope_tag("repository", "hog"), "repository:hog");
    }
}
