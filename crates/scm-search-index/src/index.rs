//! Index handles: per-session mutation of one logical index.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use scm_search_document::{Id, Indexable, SearchableType, TypedSchema, derive_schema};
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tracing::warn;

use crate::{
    IndexError,
    analyzer::IndexOptions,
    encode::{encode, scope_term, type_term, uid_term},
    manager::{IndexDetails, IndexManager},
    schema::IndexSchema,
    shared_writer::{Mutation, SharedWriter, TantivyWriter},
};

/// Name of the index used when none is given.
pub const DEFAULT_INDEX: &str = "default";

/// Selects an index and its analysis options.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexParams {
    /// Index name.
    pub name: String,
    /// Text analysis options.
    pub options: IndexOptions,
}

impl IndexParams {
    /// Creates parameters for the named index.
    pub fn new(name: impl Into<String>, options: IndexOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

impl Default for IndexParams {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX, IndexOptions::Default)
    }
}

/// Mutation API of one index, for objects of type `T`.
///
/// Changes become visible to searches once the last open session on the index is closed.
pub trait Index<T> {
    /// Returns the type and name of the index.
    fn details(&self) -> &IndexDetails;

    /// Stores `object` under `id`, replacing any document with the same id.
    fn store(&mut self, id: &Id, permission: Option<&str>, object: &T) -> Result<(), IndexError>;

    /// Deletes the document with `id`.
    fn delete(&mut self, id: &Id) -> Result<(), IndexError>;

    /// Deletes every document of the type.
    fn delete_by_type(&mut self) -> Result<(), IndexError>;

    /// Deletes every document of the type within a scope, e.g. one repository.
    fn delete_by_scope(&mut self, scope_type: &str, scope_id: &str) -> Result<(), IndexError>;

    /// Ends the session. Calling it again has no effect.
    fn close(&mut self) -> Result<(), IndexError>;
}

/// Turns index operations on `T` into writer mutations.
pub struct MutationEncoder<T> {
    /// Converts objects into documents.
    typed: Arc<TypedSchema<T>>,
    /// Field handles of the index.
    schema: IndexSchema,
}

impl<T: Indexable> MutationEncoder<T> {
    /// Creates an encoder for `T`.
    pub fn new() -> Result<Self, IndexError> {
        let typed = derive_schema::<T>()?;
        let schema = IndexSchema::new(Arc::clone(typed.searchable_type()));
        Ok(Self { typed, schema })
    }

    /// Returns the searchable type.
    pub fn searchable(&self) -> &Arc<SearchableType> {
        self.typed.searchable_type()
    }

    /// Converts and encodes an upsert.
    pub fn store(&self, id: &Id, permission: Option<&str>, object: &T) -> Result<Mutation, IndexError> {
        let document = self.typed.convert(object)?;
        Ok(Mutation::Upsert(encode(&self.schema, id, permission, &document)?))
    }

    /// Deletes one document.
    pub fn delete(&self, id: &Id) -> Mutation {
        delete_mutation(&self.schema, id)
    }

    /// Deletes every document of the type.
    pub fn delete_by_type(&self) -> Mutation {
        delete_by_type_mutation(&self.schema)
    }

    /// Deletes every document of the type within a scope.
    pub fn delete_by_scope(&self, scope_type: &str, scope_id: &str) -> Mutation {
        delete_by_scope_mutation(&self.schema, scope_type, scope_id)
    }
}

/// Deletes the document with `id`.
fn delete_mutation(schema: &IndexSchema, id: &Id) -> Mutation {
    Mutation::DeleteTerm(uid_term(schema, id))
}

/// Deletes every document of the schema's type.
fn delete_by_type_mutation(schema: &IndexSchema) -> Mutation {
    Mutation::DeleteTerm(type_term(schema))
}

/// Deletes the type's documents tagged with one scope.
fn delete_by_scope_mutation(schema: &IndexSchema, scope_type: &str, scope_id: &str) -> Mutation {
    let clauses: Vec<(Occur, Box<dyn Query>)> = vec![
        (
            Occur::Must,
            Box::new(TermQuery::new(type_term(schema), IndexRecordOption::Basic)),
        ),
        (
            Occur::Must,
            Box::new(TermQuery::new(
                scope_term(schema, scope_type, scope_id),
                IndexRecordOption::Basic,
            )),
        ),
    ];
    Mutation::DeleteQuery(Box::new(BooleanQuery::new(clauses)))
}

/// Hands out index handles sharing one writer per index.
pub struct IndexFactory {
    /// Opens physical writers.
    manager: Arc<IndexManager>,
    /// Shared writers by index.
    writers: Mutex<HashMap<IndexDetails, Arc<SharedWriter<TantivyWriter>>>>,
}

impl IndexFactory {
    /// Creates a factory on top of a manager.
    pub fn new(manager: Arc<IndexManager>) -> Self {
        Self {
            manager,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the manager.
    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    /// Opens a session on the index selected by `params` for objects of type `T`.
    ///
    /// Repeated calls for the same type and index name share the same logical index.
    pub fn create<T: Indexable>(&self, params: &IndexParams) -> Result<SharedIndex<T>, IndexError> {
        let encoder = MutationEncoder::<T>::new()?;
        let (details, writer) = self.shared_writer(encoder.searchable(), params);
        writer.open()?;
        Ok(SharedIndex {
            details,
            encoder,
            writer,
            open: true,
        })
    }

    /// Returns the shared writer of an index, creating it on first use.
    pub fn shared_writer(
        &self,
        searchable: &Arc<SearchableType>,
        params: &IndexParams,
    ) -> (IndexDetails, Arc<SharedWriter<TantivyWriter>>) {
        let details = IndexDetails::new(searchable.name(), &params.name);
        let mut writers = self.writers.lock();
        let writer = writers.entry(details.clone()).or_insert_with(|| {
            let manager = Arc::clone(&self.manager);
            let searchable = Arc::clone(searchable);
            let params = params.clone();
            Arc::new(SharedWriter::new(move || {
                manager.open_for_write(&searchable, &params.name, &params.options)
            }))
        });
        (details, Arc::clone(writer))
    }

    /// Opens a session that is not bound to a Rust type.
    pub fn open_any(
        &self,
        searchable: &Arc<SearchableType>,
        params: &IndexParams,
    ) -> Result<AnyIndex, IndexError> {
        let (details, writer) = self.shared_writer(searchable, params);
        writer.open()?;
        Ok(AnyIndex {
            details,
            schema: IndexSchema::new(Arc::clone(searchable)),
            writer,
            open: true,
        })
    }
}

/// Direct index handle: every call goes straight to the shared writer.
pub struct SharedIndex<T> {
    /// Type and name of the index.
    details: IndexDetails,
    /// Encodes operations.
    encoder: MutationEncoder<T>,
    /// Writer shared with other sessions.
    writer: Arc<SharedWriter<TantivyWriter>>,
    /// Whether this session still holds the writer.
    open: bool,
}

impl<T> SharedIndex<T> {
    /// Applies a mutation, failing once the session is closed.
    fn apply(&self, mutation: Mutation) -> Result<(), IndexError> {
        if !self.open {
            return Err(IndexError::WriterClosed);
        }
        self.writer.apply(mutation)
    }
}

impl<T: Indexable> Index<T> for SharedIndex<T> {
    fn details(&self) -> &IndexDetails {
        &self.details
    }

    fn store(&mut self, id: &Id, permission: Option<&str>, object: &T) -> Result<(), IndexError> {
        let mutation = self.encoder.store(id, permission, object)?;
        self.apply(mutation)
    }

    fn delete(&mut self, id: &Id) -> Result<(), IndexError> {
        self.apply(self.encoder.delete(id))
    }

    fn delete_by_type(&mut self) -> Result<(), IndexError> {
        self.apply(self.encoder.delete_by_type())
    }

    fn delete_by_scope(&mut self, scope_type: &str, scope_id: &str) -> Result<(), IndexError> {
        self.apply(self.encoder.delete_by_scope(scope_type, scope_id))
    }

    fn close(&mut self) -> Result<(), IndexError> {
        if self.open {
            self.open = false;
            self.writer.close()?;
        }
        Ok(())
    }
}

impl<T> Drop for SharedIndex<T> {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = self.writer.close() {
                warn!(index = ?self.details, error = %e, "failed to close index");
            }
        }
    }
}

/// Index session without an object type, for work that spans many indices.
///
/// Only the operations that need no object are offered. Like [`SharedIndex`], the session
/// holds the shared writer until it is closed or dropped.
pub struct AnyIndex {
    /// Type and name of the index.
    details: IndexDetails,
    /// Field handles of the index.
    schema: IndexSchema,
    /// Writer shared with other sessions.
    writer: Arc<SharedWriter<TantivyWriter>>,
    /// Whether this session still holds the writer.
    open: bool,
}

impl AnyIndex {
    /// Returns the type and name of the index.
    pub fn details(&self) -> &IndexDetails {
        &self.details
    }

    /// Returns the type the index was opened for.
    pub fn searchable(&self) -> &Arc<SearchableType> {
        self.schema.searchable()
    }

    /// Deletes the document with `id`.
    pub fn delete(&mut self, id: &Id) -> Result<(), IndexError> {
        self.apply(delete_mutation(&self.schema, id))
    }

    /// Deletes every document of the type.
    pub fn delete_by_type(&mut self) -> Result<(), IndexError> {
        self.apply(delete_by_type_mutation(&self.schema))
    }

    /// Deletes every document of the type within a scope.
    pub fn delete_by_scope(&mut self, scope_type: &str, scope_id: &str) -> Result<(), IndexError> {
        self.apply(delete_by_scope_mutation(&self.schema, scope_type, scope_id))
    }

    /// Ends the session. Calling it again has no effect.
    pub fn close(&mut self) -> Result<(), IndexError> {
        if self.open {
            self.open = false;
            self.writer.close()?;
        }
        Ok(())
    }

    /// Applies a mutation while the session is open.
    fn apply(&self, mutation: Mutation) -> Result<(), IndexError> {
        if !self.open {
            return Err(IndexError::WriterClosed);
        }
        self.writer.apply(mutation)
    }
}

impl Drop for AnyIndex {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(index = ?self.details, error = %e, "failed to close index");
        }
    }
}
