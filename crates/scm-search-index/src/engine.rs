//! Entry point wiring configuration, index storage, the update queue and permissions.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::RwLock;
use scm_search_config::Config;
use scm_search_document::{Indexable, SearchableType, derive_schema};
use tracing::{debug, instrument};

use crate::{
    IndexError,
    analyzer::IndexOptions,
    index::{AnyIndex, Index, IndexFactory, IndexParams, SharedIndex},
    log::FileVersionLog,
    manager::{IndexDetails, IndexManager, normalize},
    queue::{IndexQueue, QueuedIndex},
    search::QueryBuilder,
};

/// Decides whether the searching principal holds a permission.
///
/// Any `Fn(&str) -> bool` closure is a permission check.
pub trait PermissionCheck: Send + Sync {
    /// Checks one permission tag.
    fn is_permitted(&self, permission: &str) -> bool;
}

impl<F> PermissionCheck for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_permitted(&self, permission: &str) -> bool {
        self(permission)
    }
}

/// Search and indexing for a set of registered types.
pub struct SearchEngine {
    /// Resolved configuration.
    config: Config,
    /// Index storage.
    manager: Arc<IndexManager>,
    /// Writer registry shared by direct sessions and the queue.
    factory: Arc<IndexFactory>,
    /// Background update queue.
    queue: IndexQueue,
    /// Analyzer selection derived from the configured locale.
    options: IndexOptions,
    /// Registered types by index-facing name.
    types: RwLock<BTreeMap<String, Arc<SearchableType>>>,
}

impl SearchEngine {
    /// Creates an engine storing its indices below the configured root.
    pub fn new(config: Config) -> Result<Self, IndexError> {
        let manager = Arc::new(IndexManager::from_config(&config));
        let factory = Arc::new(IndexFactory::new(Arc::clone(&manager)));
        let queue = IndexQueue::new(Arc::clone(&factory))?;
        let options = IndexOptions::from_settings(&config.index);
        debug!(root = %config.index.root.display(), ?options, "search engine created");
        Ok(Self {
            config,
            manager,
            factory,
            queue,
            options,
            types: RwLock::new(BTreeMap::new()),
        })
    }

    /// Registers `T` as searchable and returns its description.
    ///
    /// Fails with [`IndexError::DuplicateType`] when another type already uses the same name,
    /// compared the way index directories are named.
    pub fn register<T: Indexable>(&self) -> Result<Arc<SearchableType>, IndexError> {
        let searchable = Arc::clone(derive_schema::<T>()?.searchable_type());
        let directory = normalize(searchable.name());
        let mut types = self.types.write();
        if let Some(existing) = types.values().find(|existing| {
            normalize(existing.name()) == directory
                && existing.type_name() != searchable.type_name()
        }) {
            return Err(IndexError::DuplicateType {
                name: searchable.name().to_string(),
                existing: existing.type_name(),
                requested: searchable.type_name(),
            });
        }
        let registered = types
            .entry(searchable.name().to_string())
            .or_insert(searchable);
        Ok(Arc::clone(registered))
    }

    /// Returns the registered types the principal may search, ordered by name.
    pub fn searchable_types(&self, permission: &dyn PermissionCheck) -> Vec<Arc<SearchableType>> {
        self.types
            .read()
            .values()
            .filter(|searchable| is_visible(searchable, permission))
            .cloned()
            .collect()
    }

    /// Returns a query builder for `T`, registering the type on first use.
    pub fn for_type<T: Indexable>(
        &self,
        permission: Arc<dyn PermissionCheck>,
    ) -> Result<QueryBuilder, IndexError> {
        let searchable = self.register::<T>()?;
        self.builder(searchable, permission)
    }

    /// Returns a query builder for the registered type called `name`.
    #[instrument(skip(self, permission))]
    pub fn for_type_name(
        &self,
        name: &str,
        permission: Arc<dyn PermissionCheck>,
    ) -> Result<QueryBuilder, IndexError> {
        let searchable = self
            .types
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| IndexError::UnknownType(name.to_string()))?;
        self.builder(searchable, permission)
    }

    /// Returns index parameters for `name` with the configured analysis options.
    pub fn index_params(&self, name: impl Into<String>) -> IndexParams {
        IndexParams::new(name, self.options.clone())
    }

    /// Returns a buffering handle whose changes are applied by the queue on close.
    pub fn queued_index<T: Indexable>(&self, name: &str) -> Result<QueuedIndex<T>, IndexError> {
        self.register::<T>()?;
        self.queue.queued_index(self.index_params(name))
    }

    /// Opens a direct session on the index `name`.
    ///
    /// The session shares its writer with the queue, so queued batches for the same index
    /// become visible once this session is closed as well.
    pub fn index<T: Indexable>(&self, name: &str) -> Result<SharedIndex<T>, IndexError> {
        self.register::<T>()?;
        self.factory.create(&self.index_params(name))
    }

    /// Selects indices on disk for a task run against each of them on the queue.
    ///
    /// Without [`matching`](ForIndices::matching) every index of a registered type is selected.
    pub fn for_indices(&self) -> ForIndices<'_> {
        ForIndices {
            engine: self,
            predicate: Box::new(|_: &IndexDetails| true),
        }
    }

    /// Runs `task` against the index `name` on the queue worker.
    pub fn submit<T, F>(&self, name: &str, task: F) -> Result<(), IndexError>
    where
        T: Indexable,
        F: FnOnce(&mut dyn Index<T>) -> Result<(), IndexError> + Send + 'static,
    {
        self.register::<T>()?;
        self.queue.submit(self.index_params(name), task)
    }

    /// Opens the version log kept below the data root.
    pub fn version_log(&self) -> Result<FileVersionLog, IndexError> {
        FileVersionLog::in_root(&self.config.index.root)
    }

    /// Returns the update queue.
    pub fn queue(&self) -> &IndexQueue {
        &self.queue
    }

    /// Returns the index storage.
    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    /// Returns the factory shared with the queue.
    pub fn factory(&self) -> &Arc<IndexFactory> {
        &self.factory
    }

    /// Returns the analyzer selection.
    pub fn index_options(&self) -> &IndexOptions {
        &self.options
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a configured builder after checking the type permission.
    fn builder(
        &self,
        searchable: Arc<SearchableType>,
        permission: Arc<dyn PermissionCheck>,
    ) -> Result<QueryBuilder, IndexError> {
        if !is_visible(&searchable, permission.as_ref()) {
            return Err(IndexError::Unauthorized {
                type_name: searchable.name().to_string(),
            });
        }
        Ok(
            QueryBuilder::new(Arc::clone(&self.manager), searchable, permission)
                .options(self.options.clone())
                .highlighting(self.config.highlight.clone())
                .limit(self.config.search.default_limit),
        )
    }
}

/// Indices selected by [`SearchEngine::for_indices`].
///
/// Only indices of types registered with the engine can be opened; others are skipped.
pub struct ForIndices<'a> {
    /// Engine owning the indices and the queue.
    engine: &'a SearchEngine,
    /// Decides which indices receive the task.
    predicate: Box<dyn Fn(&IndexDetails) -> bool + 'a>,
}

impl<'a> ForIndices<'a> {
    /// Restricts the selection to indices accepted by `predicate`.
    #[must_use]
    pub fn matching(mut self, predicate: impl Fn(&IndexDetails) -> bool + 'a) -> Self {
        self.predicate = Box::new(predicate);
        self
    }

    /// Submits `task` once per selected index and returns the number of submissions.
    ///
    /// Each run gets its own session, closed after the task whether it failed or not.
    pub fn batch<F>(self, task: F) -> usize
    where
        F: Fn(&mut AnyIndex) -> Result<(), IndexError> + Send + Sync + 'static,
    {
        let types: BTreeMap<String, Arc<SearchableType>> = self
            .engine
            .types
            .read()
            .values()
            .map(|searchable| (normalize(searchable.name()), Arc::clone(searchable)))
            .collect();
        let task = Arc::new(task);
        let mut submitted = 0;
        for details in self.engine.manager.all() {
            if !(self.predicate)(&details) {
                continue;
            }
            let Some(searchable) = types.get(&details.type_name) else {
                debug!(index = ?details, "skipping index of unregistered type");
                continue;
            };
            self.engine.queue.submit_any(
                Arc::clone(searchable),
                self.engine.index_params(details.index_name.as_str()),
                Arc::clone(&task),
            );
            submitted += 1;
        }
        debug!(submitted, "submitted task for indices");
        submitted
    }
}

/// Whether the principal may search a type; types without a permission are public.
fn is_visible(searchable: &SearchableType, permission: &dyn PermissionCheck) -> bool {
    searchable
        .permission()
        .is_none_or(|required| permission.is_permitted(required))
}

#[cfg(test)]
mod tests {
    use scm_search_document::{FieldOptions, TypeBuilder};
    use tempfile::TempDir;

    use super::*;

    struct Repository {
        name: String,
    }

    impl Indexable for Repository {
        fn describe(builder: &mut TypeBuilder<Self>) {
            builder.permission("repository:read").field(
                "name",
                |r: &Self| r.name.clone(),
                FieldOptions::new().default_query(),
            );
        }
    }

    struct Group {
        name: String,
    }

    impl Indexable for Group {
        fn describe(builder: &mut TypeBuilder<Self>) {
            builder.field(
                "name",
                |g: &Self| g.name.clone(),
                FieldOptions::new().default_query(),
            );
        }
    }

    mod other {
        use scm_search_document::{FieldOptions, Indexable, TypeBuilder};

        pub struct Repository;

        impl Indexable for Repository {
            fn describe(builder: &mut TypeBuilder<Self>) {
                builder.field("url", |_: &Self| String::new(), FieldOptions::new());
            }
        }

        pub struct Shouting;

        impl Indexable for Shouting {
            fn describe(builder: &mut TypeBuilder<Self>) {
                builder
                    .alias("REPOSITORY")
                    .field("url", |_: &Self| String::new(), FieldOptions::new());
            }
        }
    }

    fn engine(dir: &TempDir) -> SearchEngine {
        let mut config = Config::default();
        config.index.root = dir.path().to_path_buf();
        config.index.writer_heap_bytes = 15_000_000;
        SearchEngine::new(config).unwrap()
    }

    fn deny_all() -> Arc<dyn PermissionCheck> {
        Arc::new(|_: &str| false)
    }

    #[test]
    fn closures_are_permission_checks() {
        let check = |tag: &str| tag == "repository:read";
        assert!(check.is_permitted("repository:read"));
        assert!(!check.is_permitted("user:read"));
    }

    #[test]
    fn searchable_types_respect_type_permission() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.register::<Repository>().unwrap();
        engine.register::<Group>().unwrap();

        let all = engine.searchable_types(&|_: &str| true);
        let names: Vec<&str> = all.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["group", "repository"]);

        let public = engine.searchable_types(&|_: &str| false);
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].name(), "group");
    }

    #[test]
    fn unauthorized_type_is_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let err = engine.for_type::<Repository>(deny_all()).err().unwrap();
        assert!(matches!(err, IndexError::Unauthorized { ref type_name } if type_name == "repository"));
        assert!(engine.for_type::<Group>(deny_all()).is_ok());
    }

    #[test]
    fn unknown_type_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let err = engine.for_type_name("ghost", deny_all()).err().unwrap();
        assert!(matches!(err, IndexError::UnknownType(ref name) if name == "ghost"));
    }

    #[test]
    fn queued_changes_become_searchable() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        let mut index = engine.queued_index::<Group>("default").unwrap();
        index
            .store(
                &"g1".into(),
                None,
                &Group {
                    name: "heart of gold".into(),
                },
            )
            .unwrap();
        index.close().unwrap();
        engine.queue().wait_until_drained();

        let result = engine
            .for_type_name("group", deny_all())
            .unwrap()
            .execute("gold")
            .unwrap();
        assert_eq!(result.total_hits, 1);
        assert_eq!(result.hits[0].id, "g1");
    }

    #[test]
    fn conflicting_type_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.register::<Repository>().unwrap();

        let err = engine.register::<other::Repository>().err().unwrap();
        assert!(matches!(err, IndexError::DuplicateType { ref name, .. } if name == "repository"));
        let err = engine.register::<other::Shouting>().err().unwrap();
        assert!(matches!(err, IndexError::DuplicateType { ref name, .. } if name == "REPOSITORY"));

        let again = engine.register::<Repository>().unwrap();
        assert!(again.field("name").is_some());
        let registered = engine.searchable_types(&|_: &str| true);
        assert_eq!(registered.len(), 1);
        assert!(registered[0].field("url").is_none());
    }
}
