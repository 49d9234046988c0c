//! On-disk layout and lifecycle of search indices.
//!
//! Indices live at `<root>/index/<type>/<name>`, where both path components are normalized
//! with [`normalize`]. Any directory at that depth holding a Tantivy `meta.json` is a known
//! index, so the registry survives restarts and is shared by every manager on the same root.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use scm_search_config::Config;
use scm_search_document::SearchableType;
use serde::Serialize;
use tantivy::{
    Index as TantivyIndex, IndexReader, ReloadPolicy, Searcher, TantivyError,
    directory::MmapDirectory, tokenizer::TokenizerManager,
};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::{
    IndexError,
    analyzer::{self, IndexOptions},
    schema::IndexSchema,
    shared_writer::TantivyWriter,
};

/// Name of the directory below the root that holds all indices.
const INDEX_DIRECTORY: &str = "index";

/// File Tantivy writes into every index directory.
const META_FILE: &str = "meta.json";

/// Identifies one index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDetails {
    /// Normalized type name.
    pub type_name: String,
    /// Normalized index name.
    pub index_name: String,
}

impl IndexDetails {
    /// Creates details, normalizing both names.
    pub fn new(type_name: &str, index_name: &str) -> Self {
        Self {
            type_name: normalize(type_name),
            index_name: normalize(index_name),
        }
    }
}

/// Lowercases `name` and replaces characters outside `[a-z0-9_-]` with `_`.
pub fn normalize(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A read-only view of one index, fixed at open time.
pub struct ReadSnapshot {
    /// Field handles for the searched type.
    schema: IndexSchema,
    /// Tantivy searcher over the committed segments.
    searcher: Searcher,
    /// Analyzers registered with the index.
    tokenizers: TokenizerManager,
}

impl ReadSnapshot {
    /// Creates a snapshot from an opened index.
    fn open(index: &TantivyIndex, schema: IndexSchema) -> Result<Self, IndexError> {
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| IndexError::search(&e))?;
        Ok(Self {
            schema,
            searcher: reader.searcher(),
            tokenizers: index.tokenizers().clone(),
        })
    }

    /// Returns the schema.
    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Returns the searcher.
    pub fn searcher(&self) -> &Searcher {
        &self.searcher
    }

    /// Returns the analyzers of the index.
    pub fn tokenizers(&self) -> &TokenizerManager {
        &self.tokenizers
    }

    /// Returns the number of live documents.
    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }
}

/// Opens, lists and clears indices below one root directory.
#[derive(Debug, Clone)]
pub struct IndexManager {
    /// Directory holding one subdirectory per type.
    directory: PathBuf,
    /// Memory budget of each Tantivy writer.
    writer_heap_bytes: usize,
}

impl IndexManager {
    /// Creates a manager for the data root `root`.
    pub fn new(root: &Path, writer_heap_bytes: usize) -> Self {
        Self {
            directory: root.join(INDEX_DIRECTORY),
            writer_heap_bytes,
        }
    }

    /// Creates a manager from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.index.root, config.index.writer_heap_bytes)
    }

    /// Returns the directory of the index `name` of type `type_name`.
    pub fn index_directory(&self, type_name: &str, name: &str) -> PathBuf {
        self.directory
            .join(normalize(type_name))
            .join(normalize(name))
    }

    /// Opens the index for writing, creating it when new.
    ///
    /// Existing documents are preserved. An index written for a different field layout is
    /// reported as [`IndexError::SchemaMismatch`].
    #[instrument(skip_all, fields(type_name = searchable.name(), index = name))]
    pub fn open_for_write(
        &self,
        searchable: &Arc<SearchableType>,
        name: &str,
        options: &IndexOptions,
    ) -> Result<TantivyWriter, IndexError> {
        let path = self.index_directory(searchable.name(), name);
        let schema = IndexSchema::new(Arc::clone(searchable));

        fs::create_dir_all(&path)?;
        let dir = MmapDirectory::open(&path).map_err(|e| {
            let err: TantivyError = e.into();
            IndexError::open_index(path.clone(), &err)
        })?;
        let index = TantivyIndex::open_or_create(dir, schema.schema().clone())
            .map_err(|e| open_error(&path, &e))?;
        analyzer::register(index.tokenizers(), options);

        let writer = index
            .writer(self.writer_heap_bytes)
            .map_err(|e| IndexError::open_index(path.clone(), &e))?;
        debug!(path = %path.display(), "opened index for write");
        Ok(TantivyWriter::new(writer))
    }

    /// Opens a read snapshot of the index.
    ///
    /// An index that was never written yields an empty snapshot.
    pub fn open_for_read(
        &self,
        searchable: &Arc<SearchableType>,
        name: &str,
        options: &IndexOptions,
    ) -> Result<ReadSnapshot, IndexError> {
        let path = self.index_directory(searchable.name(), name);
        let schema = IndexSchema::new(Arc::clone(searchable));

        let index = if path.join(META_FILE).is_file() {
            let index = TantivyIndex::open_in_dir(&path)
                .map_err(|e| IndexError::open_index(path.clone(), &e))?;
            if index.schema() != *schema.schema() {
                return Err(IndexError::SchemaMismatch { path });
            }
            index
        } else {
            TantivyIndex::create_in_ram(schema.schema().clone())
        };
        analyzer::register(index.tokenizers(), options);
        ReadSnapshot::open(&index, schema)
    }

    /// Lists every index found on disk.
    pub fn all(&self) -> Vec<IndexDetails> {
        if !self.directory.is_dir() {
            return Vec::new();
        }
        let mut details: Vec<IndexDetails> = WalkDir::new(&self.directory)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir() && entry.path().join(META_FILE).is_file())
            .filter_map(|entry| {
                let index_name = entry.file_name().to_str()?.to_string();
                let type_name = entry.path().parent()?.file_name()?.to_str()?.to_string();
                Some(IndexDetails {
                    type_name,
                    index_name,
                })
            })
            .collect();
        details.sort();
        details
    }

    /// Deletes an index from disk.
    pub fn clear(&self, type_name: &str, name: &str) -> Result<(), IndexError> {
        let path = self.index_directory(type_name, name);
        if path.exists() {
            fs::remove_dir_all(&path)?;
            info!(path = %path.display(), "cleared index");
        }
        Ok(())
    }
}

/// Maps an open failure, recognizing schema mismatches.
fn open_error(path: &Path, err: &TantivyError) -> IndexError {
    match err {
        TantivyError::SchemaError(_) => IndexError::SchemaMismatch {
            path: path.to_path_buf(),
        },
        other => IndexError::open_index(path.to_path_buf(), other),
    }
}
