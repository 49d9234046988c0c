//! Searchable types and document conversion.
//!
//! Indexed domain objects describe themselves by implementing [`Indexable`]. The description is
//! derived once per type into a [`TypedSchema`], which exposes the immutable
//! [`SearchableType`] (alias, permission, field descriptors) and converts instances into flat
//! [`Document`]s ready for the index.

#![warn(missing_docs)]

mod convert;
mod error;
mod id;
mod options;
mod registry;
mod schema;
mod value;

pub use convert::{Document, DocumentField};
pub use error::DocumentError;
pub use id::{Id, IdError, escape_part};
pub use options::{Analyzer, FieldOptions, Stored};
pub use registry::derive_schema;
pub use schema::{Indexable, SearchableField, SearchableType, TypeBuilder, TypedSchema};
pub use value::{FieldKind, FieldType, FieldValue, IndexedEnum, epoch_millis, from_epoch_millis};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    struct Repository {
        namespace: String,
        name: String,
    }

    impl Indexable for Repository {
        fn describe(builder: &mut TypeBuilder<Self>) {
            builder
                .permission("repository:read")
                .field("namespace", |r: &Self| r.namespace.clone(), FieldOptions::new())
                .field(
                    "name",
                    |r: &Self| r.name.clone(),
                    FieldOptions::new().default_query().boost(1.5),
                );
        }
    }

    #[test]
    fn derivation_is_cached_per_type() {
        let first = derive_schema::<Repository>().unwrap();
        let second = derive_schema::<Repository>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(first.searchable_type(), second.searchable_type()));
    }

    #[test]
    fn searchable_type_describes_registration() {
        let schema = derive_schema::<Repository>().unwrap();
        let searchable = schema.searchable_type();
        assert_eq!(searchable.name(), "repository");
        assert_eq!(searchable.permission(), Some("repository:read"));
        assert!(searchable.type_name().ends_with("Repository"));
        let defaults: Vec<&str> = searchable
            .default_query_fields()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(defaults, ["name"]);
    }

    #[test]
    fn converted_document_matches_instance() {
        let schema = derive_schema::<Repository>().unwrap();
        let doc = schema
            .convert(&Repository {
                namespace: "hitchhiker".into(),
                name: "heart-of-gold".into(),
            })
            .unwrap();
        assert_eq!(doc.get("namespace").and_then(FieldValue::as_text), Some("hitchhiker"));
        assert_eq!(doc.get("name").and_then(FieldValue::as_text), Some("heart-of-gold"));
    }
}
