//! Reference-counted access to one physical index writer.
//!
//! Tantivy allows a single writer per index directory. [`SharedWriter`] hands that writer to
//! any number of concurrent sessions: the first [`open`](SharedWriter::open) obtains it from a
//! supplier, the last [`close`](SharedWriter::close) commits and releases it.
//!
//! Open and close take the write lock. Mutations only need the read lock because the Tantivy
//! writer queues operations through `&self`.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tantivy::{IndexWriter as TantivyIndexWriter, TantivyDocument, Term, query::Query};
use tracing::debug;

use crate::{IndexError, encode::EncodedDocument};

/// Operations a shared writer can forward to its physical writer.
pub trait PhysicalWriter: Send + Sync + 'static {
    /// Replaces every document matching `key` with `document`.
    fn update(&self, key: Term, document: TantivyDocument) -> Result<(), IndexError>;

    /// Deletes every document containing `term`.
    fn delete_term(&self, term: Term) -> Result<(), IndexError>;

    /// Deletes every document matching `query`.
    fn delete_query(&self, query: Box<dyn Query>) -> Result<(), IndexError>;

    /// Deletes every document.
    fn delete_all(&self) -> Result<(), IndexError>;

    /// Makes pending changes visible to new readers.
    fn commit(&mut self) -> Result<(), IndexError>;

    /// Releases the writer.
    fn close(self) -> Result<(), IndexError>
    where
        Self: Sized;
}

/// A buffered mutation.
#[derive(Debug)]
pub enum Mutation {
    /// Insert or replace a document.
    Upsert(EncodedDocument),
    /// Delete by term.
    DeleteTerm(Term),
    /// Delete by query.
    DeleteQuery(Box<dyn Query>),
    /// Delete everything.
    DeleteAll,
}

/// Produces a fresh physical writer.
type Supplier<W> = Box<dyn Fn() -> Result<W, IndexError> + Send + Sync>;

/// One physical writer shared by all sessions on the same index.
pub struct SharedWriter<W> {
    /// Creates the physical writer on first open.
    supplier: Supplier<W>,
    /// The writer while at least one session is open.
    writer: RwLock<Option<W>>,
    /// Number of open sessions; only changed under the write lock.
    usage: AtomicUsize,
}

impl<W: PhysicalWriter> SharedWriter<W> {
    /// Creates a closed shared writer.
    pub fn new(supplier: impl Fn() -> Result<W, IndexError> + Send + Sync + 'static) -> Self {
        Self {
            supplier: Box::new(supplier),
            writer: RwLock::new(None),
            usage: AtomicUsize::new(0),
        }
    }

    /// Registers a session, obtaining the physical writer if none is open.
    pub fn open(&self) -> Result<(), IndexError> {
        let mut writer = self.writer.write();
        if writer.is_none() {
            debug!("opening physical writer");
            *writer = Some((self.supplier)()?);
        }
        self.usage.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Ends a session. The last session commits and closes the physical writer.
    ///
    /// Returns whether the physical writer was closed. Closing an unopened writer is a no-op.
    pub fn close(&self) -> Result<bool, IndexError> {
        let mut guard = self.writer.write();
        let usage = self.usage.load(Ordering::SeqCst);
        if usage == 0 {
            return Ok(false);
        }
        self.usage.store(usage - 1, Ordering::SeqCst);
        if usage > 1 {
            return Ok(false);
        }
        let Some(mut writer) = guard.take() else {
            return Ok(false);
        };
        debug!("closing physical writer");
        let committed = writer.commit();
        let closed = writer.close();
        committed.and(closed)?;
        Ok(true)
    }

    /// Returns the number of open sessions.
    pub fn usage(&self) -> usize {
        self.usage.load(Ordering::SeqCst)
    }

    /// Applies a buffered mutation.
    pub fn apply(&self, mutation: Mutation) -> Result<(), IndexError> {
        match mutation {
            Mutation::Upsert(encoded) => self.update(encoded.key, encoded.document),
            Mutation::DeleteTerm(term) => self.delete_by_term(term),
            Mutation::DeleteQuery(query) => self.delete_by_query(query),
            Mutation::DeleteAll => self.delete_all(),
        }
    }

    /// Replaces every document matching `key` with `document`.
    pub fn update(&self, key: Term, document: TantivyDocument) -> Result<(), IndexError> {
        self.with_writer(|w| w.update(key, document))
    }

    /// Deletes every document containing `term`.
    pub fn delete_by_term(&self, term: Term) -> Result<(), IndexError> {
        self.with_writer(|w| w.delete_term(term))
    }

    /// Deletes every document matching `query`.
    pub fn delete_by_query(&self, query: Box<dyn Query>) -> Result<(), IndexError> {
        self.with_writer(|w| w.delete_query(query))
    }

    /// Deletes every document.
    pub fn delete_all(&self) -> Result<(), IndexError> {
        self.with_writer(PhysicalWriter::delete_all)
    }

    /// Commits pending changes without closing.
    pub fn commit(&self) -> Result<(), IndexError> {
        let mut guard = self.writer.write();
        guard.as_mut().ok_or(IndexError::WriterClosed)?.commit()
    }

    /// Runs `f` against the open writer under the read lock.
    fn with_writer(&self, f: impl FnOnce(&W) -> Result<(), IndexError>) -> Result<(), IndexError> {
        let guard = self.writer.read();
        f(guard.as_ref().ok_or(IndexError::WriterClosed)?)
    }
}

/// Physical writer backed by a Tantivy index writer.
pub struct TantivyWriter {
    /// The underlying Tantivy writer.
    writer: TantivyIndexWriter,
}

impl TantivyWriter {
    /// Wraps a Tantivy writer.
    pub fn new(writer: TantivyIndexWriter) -> Self {
        Self { writer }
    }
}

impl PhysicalWriter for TantivyWriter {
    fn update(&self, key: Term, document: TantivyDocument) -> Result<(), IndexError> {
        self.writer.delete_term(key);
        self.writer
            .add_document(document)
            .map_err(|e| IndexError::write(&e))?;
        Ok(())
    }

    fn delete_term(&self, term: Term) -> Result<(), IndexError> {
        self.writer.delete_term(term);
        Ok(())
    }

    fn delete_query(&self, query: Box<dyn Query>) -> Result<(), IndexError> {
        self.writer
            .delete_query(query)
            .map_err(|e| IndexError::write(&e))?;
        Ok(())
    }

    fn delete_all(&self) -> Result<(), IndexError> {
        self.writer
            .delete_all_documents()
            .map_err(|e| IndexError::write(&e))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), IndexError> {
        self.writer.commit().map_err(|e| IndexError::commit(&e))?;
        Ok(())
    }

    fn close(self) -> Result<(), IndexError> {
        self.writer
            .wait_merging_threads()
            .map_err(|e| IndexError::commit(&e))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use tantivy::schema::Field;

    use super::*;

    #[derive(Default)]
    struct Counters {
        supplied: AtomicUsize,
        closed: AtomicUsize,
        committed_docs: AtomicUsize,
    }

    struct MockWriter {
        counters: Arc<Counters>,
        pending: AtomicUsize,
    }

    impl PhysicalWriter for MockWriter {
        fn update(&self, _key: Term, _document: TantivyDocument) -> Result<(), IndexError> {
            self.pending.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn delete_term(&self, _term: Term) -> Result<(), IndexError> {
            Ok(())
        }

        fn delete_query(&self, _query: Box<dyn Query>) -> Result<(), IndexError> {
            Ok(())
        }

        fn delete_all(&self) -> Result<(), IndexError> {
            Ok(())
        }

        fn commit(&mut self) -> Result<(), IndexError> {
            let pending = self.pending.swap(0, Ordering::SeqCst);
            self.counters
                .committed_docs
                .fetch_add(pending, Ordering::SeqCst);
            Ok(())
        }

        fn close(self) -> Result<(), IndexError> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn shared(counters: &Arc<Counters>) -> SharedWriter<MockWriter> {
        let counters = Arc::clone(counters);
        SharedWriter::new(move || {
            counters.supplied.fetch_add(1, Ordering::SeqCst);
            Ok(MockWriter {
                counters: Arc::clone(&counters),
                pending: AtomicUsize::new(0),
            })
        })
    }

    fn key() -> Term {
        Term::from_field_text(Field::from_field_id(0), "one")
    }

    #[test]
    fn open_n_close_n_supplies_and_closes_once() {
        let counters = Arc::new(Counters::default());
        let writer = shared(&counters);
        for _ in 0..3 {
            writer.open().unwrap();
        }
        assert!(!writer.close().unwrap());
        assert!(!writer.close().unwrap());
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
        assert!(writer.close().unwrap());

        assert_eq!(counters.supplied.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert_eq!(writer.usage(), 0);
    }

    #[test]
    fn reopen_after_close_gets_fresh_writer() {
        let counters = Arc::new(Counters::default());
        let writer = shared(&counters);
        writer.open().unwrap();
        writer.close().unwrap();
        writer.open().unwrap();
        writer.close().unwrap();
        assert_eq!(counters.supplied.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn mutations_require_open_writer() {
        let counters = Arc::new(Counters::default());
        let writer = shared(&counters);
        let err = writer.update(key(), TantivyDocument::new()).unwrap_err();
        assert!(matches!(err, IndexError::WriterClosed));
        assert!(matches!(writer.commit(), Err(IndexError::WriterClosed)));
        assert!(!writer.close().unwrap());
    }

    #[test]
    fn close_commits_pending_updates() {
        let counters = Arc::new(Counters::default());
        let writer = shared(&counters);
        writer.open().unwrap();
        writer.update(key(), TantivyDocument::new()).unwrap();
        writer
            .apply(Mutation::Upsert(EncodedDocument {
                key: key(),
                document: TantivyDocument::new(),
            }))
            .unwrap();
        writer.close().unwrap();
        assert_eq!(counters.committed_docs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_sessions_lose_nothing() {
        let counters = Arc::new(Counters::default());
        let writer = Arc::new(shared(&counters));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let writer = Arc::clone(&writer);
                thread::spawn(move || {
                    for _ in 0..50 {
                        writer.open().unwrap();
                        writer.update(key(), TantivyDocument::new()).unwrap();
                        writer.close().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.committed_docs.load(Ordering::SeqCst), 400);
        assert_eq!(
            counters.supplied.load(Ordering::SeqCst),
            counters.closed.load(Ordering::SeqCst)
        );
        assert_eq!(writer.usage(), 0);
    }
}
