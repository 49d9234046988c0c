//! Asynchronous, ordered index updates.
//!
//! A [`QueuedIndex`] buffers its mutations and hands them to the queue as one batch when it
//! is closed. A single background worker applies batches in submission order, each within
//! its own writer session, so the batch is committed when the worker closes it.

use std::{
    collections::VecDeque,
    mem,
    sync::Arc,
    thread::{self, JoinHandle},
};

use parking_lot::{Condvar, Mutex};
use scm_search_document::{Id, Indexable, SearchableType};
use tracing::{debug, error, instrument};

use crate::{
    IndexError,
    index::{AnyIndex, Index, IndexFactory, IndexParams, MutationEncoder},
    manager::IndexDetails,
    shared_writer::Mutation,
};

/// Work executed by the queue worker.
type Job = Box<dyn FnOnce(&IndexFactory) -> Result<(), IndexError> + Send>;

/// A submitted unit of work.
struct Task {
    /// Index the task writes to, for logging.
    details: IndexDetails,
    /// Number of mutations the task accounts for in [`IndexQueue::size`].
    weight: usize,
    /// The work itself.
    job: Job,
}

/// Queue state guarded by one mutex.
#[derive(Default)]
struct State {
    /// Tasks waiting for the worker.
    tasks: VecDeque<Task>,
    /// Mutations submitted but not yet applied.
    pending: usize,
    /// Set when the queue is dropped; the worker drains and exits.
    shutdown: bool,
}

/// State shared between the queue handle and its worker.
struct Shared {
    /// Queue state.
    state: Mutex<State>,
    /// Signals new tasks or shutdown to the worker.
    available: Condvar,
    /// Signals that `pending` dropped to zero.
    drained: Condvar,
    /// Opens index sessions for tasks.
    factory: Arc<IndexFactory>,
}

/// Single-worker queue applying index updates in submission order.
pub struct IndexQueue {
    /// State shared with the worker.
    shared: Arc<Shared>,
    /// Worker thread, joined on drop.
    worker: Option<JoinHandle<()>>,
}

impl IndexQueue {
    /// Starts a queue and its worker thread.
    pub fn new(factory: Arc<IndexFactory>) -> Result<Self, IndexError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            available: Condvar::new(),
            drained: Condvar::new(),
            factory,
        });
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("scm-search-index-queue".into())
                .spawn(move || run_worker(&shared))?
        };
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Returns a buffering index handle for objects of type `T`.
    pub fn queued_index<T: Indexable>(&self, params: IndexParams) -> Result<QueuedIndex<T>, IndexError> {
        let encoder = MutationEncoder::<T>::new()?;
        let searchable = Arc::clone(encoder.searchable());
        let details = IndexDetails::new(searchable.name(), &params.name);
        Ok(QueuedIndex {
            queue: Arc::clone(&self.shared),
            details,
            params,
            searchable,
            encoder,
            mutations: Vec::new(),
            closed: false,
        })
    }

    /// Runs `task` against a direct index handle on the worker.
    ///
    /// The handle is closed after the task, whether it succeeded or not.
    pub fn submit<T, F>(&self, params: IndexParams, task: F) -> Result<(), IndexError>
    where
        T: Indexable,
        F: FnOnce(&mut dyn Index<T>) -> Result<(), IndexError> + Send + 'static,
    {
        let encoder = MutationEncoder::<T>::new()?;
        let details = IndexDetails::new(encoder.searchable().name(), &params.name);
        let job: Job = Box::new(move |factory: &IndexFactory| {
            let mut index = factory.create::<T>(&params)?;
            let result = task(&mut index);
            let closed = index.close();
            result.and(closed)
        });
        self.shared.push(Task {
            details,
            weight: 1,
            job,
        });
        Ok(())
    }

    /// Runs `task` against an untyped session on the index of `searchable` selected by `params`.
    ///
    /// The same task may be submitted for several indices, hence the shared reference.
    pub fn submit_any<F>(
        &self,
        searchable: Arc<SearchableType>,
        params: IndexParams,
        task: Arc<F>,
    ) where
        F: Fn(&mut AnyIndex) -> Result<(), IndexError> + Send + Sync + 'static,
    {
        let details = IndexDetails::new(searchable.name(), &params.name);
        let job: Job = Box::new(move |factory: &IndexFactory| {
            let mut index = factory.open_any(&searchable, &params)?;
            let result = task(&mut index);
            let closed = index.close();
            result.and(closed)
        });
        self.shared.push(Task {
            details,
            weight: 1,
            job,
        });
    }

    /// Returns the number of submitted mutations not yet applied.
    pub fn size(&self) -> usize {
        self.shared.state.lock().pending
    }

    /// Blocks until every submitted mutation has been applied.
    pub fn wait_until_drained(&self) {
        let mut state = self.shared.state.lock();
        while state.pending > 0 {
            self.shared.drained.wait(&mut state);
        }
    }
}

impl Drop for IndexQueue {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.available.notify_all();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("index queue worker panicked");
        }
    }
}

impl Shared {
    /// Enqueues a task without blocking on its execution.
    fn push(&self, task: Task) {
        let mut state = self.state.lock();
        state.pending += task.weight;
        state.tasks.push_back(task);
        drop(state);
        self.available.notify_one();
    }

    /// Waits for the next task; `None` once shut down and empty.
    fn next(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.shutdown {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Marks a task's mutations as applied.
    fn complete(&self, weight: usize) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(weight);
        if state.pending == 0 {
            self.drained.notify_all();
        }
    }
}

/// Worker loop: runs tasks one at a time until shutdown.
fn run_worker(shared: &Shared) {
    while let Some(task) = shared.next() {
        execute(shared, task);
    }
    debug!("index queue worker stopped");
}

/// Runs one task, logging failures.
#[instrument(skip_all, fields(index = ?task.details, weight = task.weight))]
fn execute(shared: &Shared, task: Task) {
    let Task { weight, job, .. } = task;
    if let Err(e) = job(&shared.factory) {
        error!(error = %e, "index batch failed");
    }
    shared.complete(weight);
}

/// Index handle that buffers mutations until it is closed.
pub struct QueuedIndex<T> {
    /// Queue receiving the batch.
    queue: Arc<Shared>,
    /// Type and name of the index.
    details: IndexDetails,
    /// Parameters used by the worker to open the index.
    params: IndexParams,
    /// Type the worker opens the index for.
    searchable: Arc<SearchableType>,
    /// Encodes operations.
    encoder: MutationEncoder<T>,
    /// Buffered mutations.
    mutations: Vec<Mutation>,
    /// Whether the batch was submitted.
    closed: bool,
}

impl<T> QueuedIndex<T> {
    /// Buffers a mutation, failing once the batch was submitted.
    fn buffer(&mut self, mutation: Mutation) -> Result<(), IndexError> {
        if self.closed {
            return Err(IndexError::WriterClosed);
        }
        self.mutations.push(mutation);
        Ok(())
    }

    /// Submits the buffered mutations as one batch.
    fn submit(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mutations = mem::take(&mut self.mutations);
        if mutations.is_empty() {
            return;
        }
        let weight = mutations.len();
        let params = self.params.clone();
        let searchable = Arc::clone(&self.searchable);
        let job: Job = Box::new(move |factory: &IndexFactory| {
            let (_, writer) = factory.shared_writer(&searchable, &params);
            writer.open()?;
            let applied = mutations
                .into_iter()
                .try_for_each(|mutation| writer.apply(mutation));
            let closed = writer.close().map(|_| ());
            applied.and(closed)
        });
        self.queue.push(Task {
            details: self.details.clone(),
            weight,
            job,
        });
    }
}

impl<T: Indexable> Index<T> for QueuedIndex<T> {
    fn details(&self) -> &IndexDetails {
        &self.details
    }

    fn store(&mut self, id: &Id, permission: Option<&str>, object: &T) -> Result<(), IndexError> {
        let mutation = self.encoder.store(id, permission, object)?;
        self.buffer(mutation)
    }

    fn delete(&mut self, id: &Id) -> Result<(), IndexError> {
        let mutation = self.encoder.delete(id);
        self.buffer(mutation)
    }

    fn delete_by_type(&mut self) -> Result<(), IndexError> {
        let mutation = self.encoder.delete_by_type();
        self.buffer(mutation)
    }

    fn delete_by_scope(&mut self, scope_type: &str, scope_id: &str) -> Result<(), IndexError> {
        let mutation = self.encoder.delete_by_scope(scope_type, scope_id);
        self.buffer(mutation)
    }

    fn close(&mut self) -> Result<(), IndexError> {
        self.submit();
        Ok(())
    }
}

impl<T> Drop for QueuedIndex<T> {
    fn drop(&mut self) {
        self.submit();
    }
}

#[cfg(test)]
mod tests {
    use scm_search_document::{FieldOptions, TypeBuilder, derive_schema};
    use tempfile::TempDir;

    use super::*;
    use crate::{analyzer::IndexOptions, index::DEFAULT_INDEX, manager::IndexManager};

    struct Note {
        text: String,
    }

    impl Indexable for Note {
        fn describe(builder: &mut TypeBuilder<Self>) {
            builder.field("text", |n: &Self| n.text.clone(), FieldOptions::new());
        }
    }

    fn note(text: &str) -> Note {
        Note { text: text.into() }
    }

    fn queue(dir: &TempDir) -> IndexQueue {
        let manager = Arc::new(IndexManager::new(dir.path(), 15_000_000));
        IndexQueue::new(Arc::new(IndexFactory::new(manager))).unwrap()
    }

    fn count(dir: &TempDir) -> u64 {
        let manager = IndexManager::new(dir.path(), 15_000_000);
        let typed = derive_schema::<Note>().unwrap();
        manager
            .open_for_read(typed.searchable_type(), DEFAULT_INDEX, &IndexOptions::Default)
            .unwrap()
            .num_docs()
    }

    #[test]
    fn concurrent_producers_drain_in_order() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(queue(&dir));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut index = queue.queued_index::<Note>(IndexParams::default()).unwrap();
                    index.store(&Id::of(i.to_string()), None, &note("queued")).unwrap();
                    index.close().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let mut index = queue.queued_index::<Note>(IndexParams::default()).unwrap();
        index.delete(&Id::of("7")).unwrap();
        index.close().unwrap();

        queue.wait_until_drained();
        assert_eq!(queue.size(), 0);
        assert_eq!(count(&dir), 19);
    }

    #[test]
    fn size_counts_buffered_mutations() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);
        let mut index = queue.queued_index::<Note>(IndexParams::default()).unwrap();
        index.store(&Id::of("1"), None, &note("a")).unwrap();
        index.store(&Id::of("2"), None, &note("b")).unwrap();
        assert_eq!(queue.size(), 0);
        drop(index);
        queue.wait_until_drained();
        assert_eq!(queue.size(), 0);
        assert_eq!(count(&dir), 2);
    }

    #[test]
    fn failed_batches_do_not_wedge_the_queue() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);
        queue
            .submit::<Note, _>(IndexParams::default(), |_| {
                Err(IndexError::Write("boom".into()))
            })
            .unwrap();
        queue
            .submit::<Note, _>(IndexParams::default(), |index| {
                index.store(&Id::of("1"), None, &note("after failure"))
            })
            .unwrap();
        queue.wait_until_drained();
        assert_eq!(count(&dir), 1);
    }

    #[test]
    fn closed_queued_index_rejects_mutations() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);
        let mut index = queue.queued_index::<Note>(IndexParams::default()).unwrap();
        index.close().unwrap();
        index.close().unwrap();
        assert!(matches!(
            index.store(&Id::of("1"), None, &note("late")),
            Err(IndexError::WriterClosed)
        ));
    }

    #[test]
    fn dropping_the_queue_finishes_pending_work() {
        let dir = TempDir::new().unwrap();
        {
            let queue = queue(&dir);
            let mut index = queue.queued_index::<Note>(IndexParams::default()).unwrap();
            index.store(&Id::of("1"), None, &note("last words")).unwrap();
        }
        assert_eq!(count(&dir), 1);
    }
}
