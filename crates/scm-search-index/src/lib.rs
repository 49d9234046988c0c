//! Tantivy-based indexing and search for repository objects.
//!
//! Types made searchable with [`Indexable`](scm_search_document::Indexable) get one index per
//! (type, index name) below the configured data root. This crate handles:
//! - Mapping searchable types onto Tantivy schemas and encoding documents
//! - Locale-aware and source-code analyzers
//! - Writers shared by concurrent sessions, committed when the last one closes
//! - A background queue applying buffered updates in submission order
//! - Best-guess and exact queries with permission filtering during collection
//! - Highlighted fragments around matched terms
//! - Version-gated re-indexing at startup and per-event updates
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use scm_search_config::Config;
//! use scm_search_document::{FieldOptions, Id, Indexable, TypeBuilder};
//! use scm_search_index::{Index, PermissionCheck, SearchEngine};
//!
//! struct Repository {
//!     name: String,
//! }
//!
//! impl Indexable for Repository {
//!     fn describe(builder: &mut TypeBuilder<Self>) {
//!         builder.field("name", |r: &Self| r.name.clone(), FieldOptions::new().default_query());
//!     }
//! }
//!
//! let engine = SearchEngine::new(Config::default()).unwrap();
//!
//! let mut index = engine.queued_index::<Repository>("default").unwrap();
//! let repository = Repository { name: "heart-of-gold".into() };
//! index.store(&Id::of("hog"), Some("repository:read:hog"), &repository).unwrap();
//! index.close().unwrap();
//! engine.queue().wait_until_drained();
//!
//! let permission: Arc<dyn PermissionCheck> = Arc::new(|_: &str| true);
//! let result = engine.for_type::<Repository>(permission).unwrap().execute("heart").unwrap();
//! assert_eq!(result.total_hits, 1);
//! ```

#![warn(missing_docs)]

mod analyzer;
mod bootstrap;
mod encode;
mod engine;
mod error;
mod highlight;
mod index;
mod log;
mod manager;
mod queue;
mod schema;
mod search;
mod shared_writer;
mod tokenizer;

pub use analyzer::{
    CODE_ANALYZER, IndexOptions, KEYWORD_ANALYZER, RAW_ANALYZER, TEXT_ANALYZER, code_analyzer,
    create as create_analyzer, keyword_analyzer, parse_language,
};
pub use bootstrap::{
    AdminContext, Bootstrap, BootstrapReport, EventKind, Indexer, Unrestricted, Updater,
    handle_event,
};
pub use encode::EncodedDocument;
pub use engine::{ForIndices, PermissionCheck, SearchEngine};
pub use error::IndexError;
pub use highlight::{FieldTerms, Highlighter, MatchedTerms, TermMatcher, merge_ranges};
pub use index::{AnyIndex, DEFAULT_INDEX, Index, IndexFactory, IndexParams, SharedIndex};
pub use log::{FileVersionLog, IndexLog, LOG_FILE, VersionLogStore};
pub use manager::{IndexDetails, IndexManager, ReadSnapshot, normalize};
pub use queue::{IndexQueue, QueuedIndex};
pub use schema::{
    ID_FIELD, IndexSchema, MappedField, PERMISSION_FIELD, SCOPE_FIELD, TYPE_FIELD, UID_FIELD,
};
pub use search::{
    Candidate, CollectedHits, CompiledQuery, CountMode, CountResult, DEFAULT_LIMIT, Hit,
    HitField, PermissionCollector, QueryBuilder, QueryCompiler, QueryResult, QueryType,
};
pub use shared_writer::{Mutation, PhysicalWriter, SharedWriter, TantivyWriter};
pub use tokenizer::{CodeTokenStream, CodeTokenizer};
