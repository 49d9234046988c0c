//! Searchable type descriptions.
//!
//! Types register their indexed properties through [`Indexable::describe`], which is run once
//! per type to produce an immutable [`TypedSchema`]: the public [`SearchableType`] description
//! plus the accessors used to read each field from an instance.

use std::{any::type_name, collections::HashSet, sync::Arc};

use serde::Serialize;

use crate::{
    Analyzer, Document, DocumentError, FieldKind, FieldOptions, FieldType, FieldValue,
    IndexedEnum, convert::DocumentField, value::kind_of,
};

/// A type whose instances can be indexed.
///
/// ```
/// use scm_search_document::{FieldOptions, Indexable, TypeBuilder, derive_schema};
///
/// struct User {
///     name: String,
///     mail: String,
/// }
///
/// impl Indexable for User {
///     fn describe(builder: &mut TypeBuilder<Self>) {
///         builder
///             .alias("user")
///             .permission("user:list")
///             .field("name", |u: &User| u.name.clone(), FieldOptions::new().default_query())
///             .field("mail", |u: &User| u.mail.clone(), FieldOptions::new());
///     }
/// }
///
/// let schema = derive_schema::<User>().unwrap();
/// assert_eq!(schema.searchable_type().name(), "user");
/// assert_eq!(schema.searchable_type().fields().len(), 2);
/// ```
pub trait Indexable: Sized + Send + Sync + 'static {
    /// Declares the type's alias, permission and indexed fields.
    fn describe(builder: &mut TypeBuilder<Self>);
}

/// Reads one field value from an instance.
type Accessor<T> = Box<dyn Fn(&T) -> Result<Option<FieldValue>, String> + Send + Sync>;

/// A field recorded by the builder, validated when the schema is built.
struct PendingField<T> {
    /// Name as declared.
    declared: String,
    /// Indexing options.
    options: FieldOptions,
    /// Kind, when the value type has an encoding.
    kind: Option<FieldKind>,
    /// Rust name of the value type.
    value_type: &'static str,
    /// Read path; `None` for metadata-only declarations.
    accessor: Option<Accessor<T>>,
}

/// Collects the indexing description of `T`.
pub struct TypeBuilder<T> {
    /// Index-facing type name.
    alias: Option<String>,
    /// Permission required to search the type.
    permission: Option<String>,
    /// Declared fields in order.
    fields: Vec<PendingField<T>>,
    /// Number of leading fields that came from ancestor types.
    inherited: usize,
}

impl<T: 'static> TypeBuilder<T> {
    /// Creates an empty builder.
    fn new() -> Self {
        Self {
            alias: None,
            permission: None,
            fields: Vec::new(),
            inherited: 0,
        }
    }

    /// Sets the index-facing type name.
    ///
    /// Defaults to the Rust type name with a lowercase first letter.
    pub fn alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.alias = Some(alias.into());
        self
    }

    /// Requires the searching principal to hold `permission` for this type.
    pub fn permission(&mut self, permission: impl Into<String>) -> &mut Self {
        self.permission = Some(permission.into());
        self
    }

    /// Declares a field that always has a value.
    pub fn field<V, F>(&mut self, name: &str, read: F, options: FieldOptions) -> &mut Self
    where
        V: FieldType,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let accessor: Accessor<T> = Box::new(move |t: &T| Ok(Some(read(t).into_value())));
        self.push::<V>(name, options, V::KIND, accessor)
    }

    /// Declares a field that may be absent; `None` produces no document field.
    pub fn optional<V, F>(&mut self, name: &str, read: F, options: FieldOptions) -> &mut Self
    where
        V: FieldType,
        F: Fn(&T) -> Option<V> + Send + Sync + 'static,
    {
        let accessor: Accessor<T> = Box::new(move |t: &T| Ok(read(t).map(FieldType::into_value)));
        self.push::<V>(name, options, V::KIND, accessor)
    }

    /// Declares a field whose accessor can fail; a failure aborts the whole conversion.
    pub fn try_field<V, F>(&mut self, name: &str, read: F, options: FieldOptions) -> &mut Self
    where
        V: FieldType,
        F: Fn(&T) -> Result<Option<V>, String> + Send + Sync + 'static,
    {
        let accessor: Accessor<T> =
            Box::new(move |t: &T| read(t).map(|v| v.map(FieldType::into_value)));
        self.push::<V>(name, options, V::KIND, accessor)
    }

    /// Declares an enum field, indexed by variant name.
    pub fn enum_field<E, F>(&mut self, name: &str, read: F, options: FieldOptions) -> &mut Self
    where
        E: IndexedEnum,
        F: Fn(&T) -> E + Send + Sync + 'static,
    {
        let accessor: Accessor<T> = Box::new(move |t: &T| {
            Ok(Some(FieldValue::Enum(read(t).variant_name().to_string())))
        });
        self.push::<E>(name, options, FieldKind::Enum, accessor)
    }

    /// Declares an enum field that may be absent.
    pub fn optional_enum<E, F>(&mut self, name: &str, read: F, options: FieldOptions) -> &mut Self
    where
        E: IndexedEnum,
        F: Fn(&T) -> Option<E> + Send + Sync + 'static,
    {
        let accessor: Accessor<T> = Box::new(move |t: &T| {
            Ok(read(t).map(|e| FieldValue::Enum(e.variant_name().to_string())))
        });
        self.push::<E>(name, options, FieldKind::Enum, accessor)
    }

    /// Declares an indexed field of type `V` without a way to read it.
    ///
    /// Such a declaration makes schema derivation fail: with [`DocumentError::UnsupportedFieldType`]
    /// when `V` has no encoding, otherwise with [`DocumentError::NonReadableField`]. It exists for
    /// types whose field list is generated from metadata that may not match the accessors.
    pub fn declare<V: 'static>(&mut self, name: &str, options: FieldOptions) -> &mut Self {
        let (kind, value_type) = kind_of::<V>();
        self.fields.push(PendingField {
            declared: name.to_string(),
            options,
            kind,
            value_type,
            accessor: None,
        });
        self
    }

    /// Includes the fields of an ancestor type ahead of this type's own fields.
    ///
    /// The ancestor's alias and permission are not inherited.
    pub fn inherit<P: Indexable>(&mut self, project: fn(&T) -> &P) -> &mut Self {
        let mut parent = TypeBuilder::<P>::new();
        P::describe(&mut parent);
        let lifted: Vec<PendingField<T>> = parent
            .fields
            .into_iter()
            .map(|field| PendingField {
                declared: field.declared,
                options: field.options,
                kind: field.kind,
                value_type: field.value_type,
                accessor: field.accessor.map(|read| -> Accessor<T> {
                    Box::new(move |t: &T| read(project(t)))
                }),
            })
            .collect();
        let count = lifted.len();
        self.fields.splice(self.inherited..self.inherited, lifted);
        self.inherited += count;
        self
    }

    /// Records a field with a known kind and accessor.
    fn push<V: 'static>(
        &mut self,
        name: &str,
        options: FieldOptions,
        kind: FieldKind,
        accessor: Accessor<T>,
    ) -> &mut Self {
        self.fields.push(PendingField {
            declared: name.to_string(),
            options,
            kind: Some(kind),
            value_type: kind_of::<V>().1,
            accessor: Some(accessor),
        });
        self
    }

    /// Validates the declarations and freezes them into a schema.
    fn build(self) -> Result<TypedSchema<T>, DocumentError> {
        let type_name = type_name::<T>();
        let mut names = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        let mut accessors = Vec::with_capacity(self.fields.len());

        for pending in self.fields {
            let name = pending.options.name.clone().unwrap_or(pending.declared);
            let Some(kind) = pending.kind else {
                return Err(DocumentError::UnsupportedFieldType {
                    type_name,
                    field: name,
                    value_type: pending.value_type,
                });
            };
            let Some(accessor) = pending.accessor else {
                return Err(DocumentError::NonReadableField {
                    type_name,
                    field: name,
                });
            };
            if !names.insert(name.clone()) {
                return Err(DocumentError::DuplicateField {
                    type_name,
                    field: name,
                });
            }
            fields.push(SearchableField::new(name, kind, &pending.options));
            accessors.push(accessor);
        }

        let searchable = SearchableType {
            type_name,
            name: self.alias.unwrap_or_else(|| default_alias(type_name)),
            permission: self.permission,
            fields,
        };
        Ok(TypedSchema {
            searchable: Arc::new(searchable),
            accessors,
        })
    }
}

/// Derives the alias used when a type declares none: `crate::model::InetOrgPerson` becomes
/// `inetOrgPerson`.
fn default_alias(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let simple = base.rsplit("::").next().unwrap_or(base);
    let mut chars = simple.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Description of one indexed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchableField {
    /// Index-facing field name.
    pub name: String,
    /// Value kind.
    pub kind: FieldKind,
    /// Whether the value is kept for retrieval.
    pub stored: bool,
    /// Whether text values are split into terms.
    pub tokenized: bool,
    /// Whether the field can be queried.
    pub searchable: bool,
    /// Whether unqualified query terms search this field.
    pub default_query: bool,
    /// Ranking weight for best-guess queries.
    pub boost: f32,
    /// Text analysis strategy.
    pub analyzer: Analyzer,
    /// Whether hits carry highlighted fragments.
    pub highlighted: bool,
}

impl SearchableField {
    /// Resolves declared options for a field of the given kind.
    ///
    /// Only searchable text can be tokenized; only tokenized, stored text can be highlighted.
    fn new(name: String, kind: FieldKind, options: &FieldOptions) -> Self {
        let tokenized = kind == FieldKind::Text && options.searchable && options.tokenized;
        let stored = options.stored.is_stored();
        Self {
            name,
            kind,
            stored,
            tokenized,
            searchable: options.searchable,
            default_query: options.searchable && options.default_query,
            boost: options.boost,
            analyzer: options.analyzer,
            highlighted: tokenized && stored && options.highlighted,
        }
    }
}

/// Immutable description of an indexable type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchableType {
    /// Rust name of the described type.
    #[serde(skip)]
    type_name: &'static str,
    /// Index-facing type name.
    name: String,
    /// Permission required to search the type.
    #[serde(skip_serializing_if = "Option::is_none")]
    permission: Option<String>,
    /// Fields in declaration order, ancestors first.
    fields: Vec<SearchableField>,
}

impl SearchableType {
    /// Returns the index-facing type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the Rust type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the permission required to search this type.
    pub fn permission(&self) -> Option<&str> {
        self.permission.as_deref()
    }

    /// Returns all fields.
    pub fn fields(&self) -> &[SearchableField] {
        &self.fields
    }

    /// Finds a field by name.
    pub fn field(&self, name: &str) -> Option<&SearchableField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the fields searched by unqualified terms.
    pub fn default_query_fields(&self) -> impl Iterator<Item = &SearchableField> {
        self.fields.iter().filter(|f| f.default_query)
    }
}

/// Schema of `T`: the searchable type plus field accessors.
pub struct TypedSchema<T> {
    /// Public description.
    searchable: Arc<SearchableType>,
    /// One accessor per field, aligned with `searchable.fields`.
    accessors: Vec<Accessor<T>>,
}

impl<T: 'static> TypedSchema<T> {
    /// Runs `T::describe` and validates the result.
    pub fn derive() -> Result<Self, DocumentError>
    where
        T: Indexable,
    {
        let mut builder = TypeBuilder::new();
        T::describe(&mut builder);
        builder.build()
    }

    /// Returns the searchable type.
    pub fn searchable_type(&self) -> &Arc<SearchableType> {
        &self.searchable
    }

    /// Converts an instance into a document.
    ///
    /// Either every field is read or an error is returned; no partial document is produced.
    pub fn convert(&self, instance: &T) -> Result<Document, DocumentError> {
        let mut fields = Vec::with_capacity(self.accessors.len());
        for (field, read) in self.searchable.fields.iter().zip(&self.accessors) {
            let value = read(instance).map_err(|message| DocumentError::FieldAccess {
                type_name: self.searchable.type_name,
                field: field.name.clone(),
                message,
            })?;
            if let Some(value) = value {
                fields.push(DocumentField {
                    name: field.name.clone(),
                    value,
                });
            }
        }
        Ok(Document::new(self.searchable.name.clone(), fields))
    }
}
