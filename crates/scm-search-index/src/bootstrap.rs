//! Startup re-indexing and incremental updates from domain events.
//!
//! Every registered [`Indexer`] carries a version. At startup [`Bootstrap::run`] compares it
//! with the version log: an absent or different entry triggers a full re-index followed by a
//! new log entry, an equal one skips the indexer without opening it. Failures are contained
//! per indexer.
//!
//! [`handle_event`] keeps an index current afterwards, one updater session per event.

use std::{marker::PhantomData, sync::Arc};

use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::{
    IndexError,
    index::DEFAULT_INDEX,
    log::{IndexLog, VersionLogStore},
    manager::IndexDetails,
};

/// Produces updater sessions for objects of type `T`.
pub trait Indexer<T>: Send + Sync {
    /// Index-facing type name.
    fn type_name(&self) -> &str;

    /// Version of the indexing logic. Changing it triggers a full re-index at startup.
    fn version(&self) -> u32;

    /// Index the objects are written to.
    fn index_name(&self) -> &str {
        DEFAULT_INDEX
    }

    /// Opens an updater session.
    fn open(&self) -> Result<Box<dyn Updater<T>>, IndexError>;
}

/// One indexing session.
pub trait Updater<T> {
    /// Stores or replaces an object.
    fn store(&mut self, object: &T) -> Result<(), IndexError>;

    /// Removes an object.
    fn delete(&mut self, object: &T) -> Result<(), IndexError>;

    /// Replaces the whole index content with the current objects.
    fn re_index_all(&mut self) -> Result<(), IndexError>;

    /// Ends the session.
    fn close(&mut self) -> Result<(), IndexError>;
}

/// Runs work with administrative rights.
pub trait AdminContext: Send + Sync {
    /// Runs `task` as the administrative principal.
    fn run_privileged(&self, task: &mut dyn FnMut());
}

/// Context for processes without principals: tasks run as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl AdminContext for Unrestricted {
    fn run_privileged(&self, task: &mut dyn FnMut()) {
        task();
    }
}

/// Indexer with its object type erased.
trait RegisteredIndexer: Send + Sync {
    /// Index-facing type name.
    fn type_name(&self) -> &str;
    /// Indexer version.
    fn version(&self) -> u32;
    /// Target index.
    fn index_name(&self) -> &str;
    /// Opens a session, re-indexes everything and closes it.
    fn re_index(&self) -> Result<(), IndexError>;
}

/// Adapts an `Indexer<T>` to [`RegisteredIndexer`].
struct Erased<T, I> {
    /// The wrapped indexer.
    indexer: I,
    /// Object type of the indexer.
    marker: PhantomData<fn() -> T>,
}

impl<T, I: Indexer<T>> RegisteredIndexer for Erased<T, I> {
    fn type_name(&self) -> &str {
        self.indexer.type_name()
    }

    fn version(&self) -> u32 {
        self.indexer.version()
    }

    fn index_name(&self) -> &str {
        self.indexer.index_name()
    }

    fn re_index(&self) -> Result<(), IndexError> {
        let mut updater = self.indexer.open()?;
        let outcome = updater.re_index_all();
        let closed = updater.close();
        outcome?;
        closed
    }
}

/// What a bootstrap run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    /// Indices that were fully re-indexed.
    pub reindexed: Vec<IndexDetails>,
    /// Indices whose logged version was current.
    pub skipped: Vec<IndexDetails>,
    /// Indices whose re-index failed, with the error message.
    pub failed: Vec<(IndexDetails, String)>,
}

/// Version-gated re-indexing of all registered indexers.
pub struct Bootstrap {
    /// Logged versions.
    log: Arc<dyn VersionLogStore>,
    /// Context the run executes in.
    context: Arc<dyn AdminContext>,
    /// Registered indexers in registration order.
    indexers: Vec<Box<dyn RegisteredIndexer>>,
}

impl Bootstrap {
    /// Creates a bootstrap with no indexers.
    pub fn new(log: Arc<dyn VersionLogStore>, context: Arc<dyn AdminContext>) -> Self {
        Self {
            log,
            context,
            indexers: Vec::new(),
        }
    }

    /// Registers an indexer.
    pub fn register<T, I>(&mut self, indexer: I) -> &mut Self
    where
        T: 'static,
        I: Indexer<T> + 'static,
    {
        self.indexers.push(Box::new(Erased {
            indexer,
            marker: PhantomData,
        }));
        self
    }

    /// Re-indexes every indexer whose version differs from the log.
    #[instrument(skip_all, fields(indexers = self.indexers.len()))]
    pub fn run(&self) -> BootstrapReport {
        let mut report = BootstrapReport::default();
        self.context.run_privileged(&mut || {
            for indexer in &self.indexers {
                self.bootstrap(indexer.as_ref(), &mut report);
            }
        });
        info!(
            reindexed = report.reindexed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "bootstrap finished"
        );
        report
    }

    /// Checks one indexer against the log.
    fn bootstrap(&self, indexer: &dyn RegisteredIndexer, report: &mut BootstrapReport) {
        let index = indexer.index_name();
        let type_name = indexer.type_name();
        let version = indexer.version();
        let details = IndexDetails::new(type_name, index);

        let logged = self.log.get(index, type_name);
        if logged.as_ref().is_some_and(|entry| entry.version == version) {
            debug!(type_name, index, version, "index is current");
            report.skipped.push(details);
            return;
        }

        info!(
            type_name,
            index,
            version,
            logged = ?logged.map(|entry| entry.version),
            "re-indexing"
        );
        let outcome = indexer
            .re_index()
            .and_then(|()| self.log.put(IndexLog::new(index, type_name, version)));
        match outcome {
            Ok(()) => report.reindexed.push(details),
            Err(e) => {
                error!(type_name, index, error = %e, "re-index failed");
                report.failed.push((details, e.to_string()));
            }
        }
    }
}

/// Kind of a domain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An object is about to be created.
    BeforeCreate,
    /// An object was created.
    Create,
    /// An object is about to be modified.
    BeforeModify,
    /// An object was modified.
    Modify,
    /// An object is about to be deleted.
    BeforeDelete,
    /// An object was deleted.
    Delete,
}

impl EventKind {
    /// Whether the event announces an action that has not happened yet.
    pub fn is_pre(self) -> bool {
        matches!(
            self,
            Self::BeforeCreate | Self::BeforeModify | Self::BeforeDelete
        )
    }
}

/// Applies one domain event to the index of `indexer`.
///
/// Pre-action events are ignored. The updater is closed before an error is returned.
pub fn handle_event<T>(
    indexer: &dyn Indexer<T>,
    kind: EventKind,
    object: &T,
) -> Result<(), IndexError> {
    if kind.is_pre() {
        return Ok(());
    }
    let mut updater = indexer.open()?;
    let outcome = match kind {
        EventKind::Delete => updater.delete(object),
        _ => updater.store(object),
    };
    let closed = updater.close();
    outcome?;
    closed
}
