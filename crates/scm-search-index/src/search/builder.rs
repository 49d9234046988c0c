//! Query execution against one type's index.

use std::{collections::BTreeMap, sync::Arc};

use scm_search_config::HighlightSettings;
use scm_search_document::{FieldValue, SearchableType};
use scm_search_query::QuerySyntax;
use tantivy::TantivyDocument;
use tracing::{debug, instrument, warn};

use super::{
    collector::{Candidate, CollectedHits, PermissionCollector},
    compile::{CompiledQuery, QueryCompiler},
    result::{CountMode, CountResult, Hit, HitField, QueryResult, QueryType},
};
use crate::{
    IndexError,
    analyzer::IndexOptions,
    encode::{stored_id, stored_value},
    engine::PermissionCheck,
    highlight::{Highlighter, MatchedTerms},
    index::DEFAULT_INDEX,
    manager::{IndexManager, ReadSnapshot},
};

/// Default number of hits per page.
pub const DEFAULT_LIMIT: usize = 10;

/// Builds and runs queries for one searchable type.
///
/// Every query is restricted to the type, to the documents the principal may see and to
/// every scope added with [`filter`](Self::filter).
#[derive(Clone)]
pub struct QueryBuilder {
    /// Opens read snapshots.
    manager: Arc<IndexManager>,
    /// Searched type.
    searchable: Arc<SearchableType>,
    /// Permission capability of the searching principal.
    permission: Arc<dyn PermissionCheck>,
    /// Index name.
    index: String,
    /// Analyzer selection of the index.
    options: IndexOptions,
    /// Highlight markers and fragment sizes.
    highlight: HighlightSettings,
    /// Required `(scope type, scope id)` pairs.
    filters: Vec<(String, String)>,
    /// Hits to skip.
    start: usize,
    /// Hits to return.
    limit: usize,
    /// Counting strictness.
    count_mode: CountMode,
}

impl QueryBuilder {
    /// Creates a builder searching the default index of `searchable`.
    pub fn new(
        manager: Arc<IndexManager>,
        searchable: Arc<SearchableType>,
        permission: Arc<dyn PermissionCheck>,
    ) -> Self {
        Self {
            manager,
            searchable,
            permission,
            index: DEFAULT_INDEX.to_string(),
            options: IndexOptions::Default,
            highlight: HighlightSettings::default(),
            filters: Vec::new(),
            start: 0,
            limit: DEFAULT_LIMIT,
            count_mode: CountMode::default(),
        }
    }

    /// Searches the index `name` instead of the default one.
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = name.into();
        self
    }

    /// Sets the analyzer selection the index was written with.
    pub fn options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets highlight markers and fragment sizes.
    pub fn highlighting(mut self, settings: HighlightSettings) -> Self {
        self.highlight = settings;
        self
    }

    /// Restricts hits to documents within the given scope. Filters accumulate.
    pub fn filter(mut self, scope_type: impl Into<String>, scope_id: impl Into<String>) -> Self {
        self.filters.push((scope_type.into(), scope_id.into()));
        self
    }

    /// Skips the first `start` hits.
    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    /// Returns at most `limit` hits.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets how thoroughly matches are counted.
    pub fn count_mode(mut self, mode: CountMode) -> Self {
        self.count_mode = mode;
        self
    }

    /// Runs `query` and returns the requested window of hits.
    #[instrument(skip(self), fields(type_name = self.searchable.name(), index = %self.index))]
    pub fn execute(&self, query: &str) -> Result<QueryResult, IndexError> {
        let snapshot = self.snapshot()?;
        let syntax = QuerySyntax::detect(query);
        let compiled = self.compile(&snapshot, syntax, query)?;

        let window = self.start.saturating_add(self.limit);
        let collected = self.collect(&snapshot, &compiled, window, self.count_mode)?;

        let highlighter = Highlighter::new(self.highlight.clone());
        let hits = collected
            .top
            .iter()
            .skip(self.start)
            .map(|candidate| self.hit(&snapshot, &compiled.terms, &highlighter, candidate))
            .filter_map(Result::transpose)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            total = collected.total,
            exact = collected.exact,
            returned = hits.len(),
            "query executed"
        );
        Ok(QueryResult {
            total_hits: collected.total,
            total_hits_exact: collected.exact,
            type_name: self.searchable.name().to_string(),
            query_type: QueryType::from(syntax),
            hits,
        })
    }

    /// Counts the permitted matches of `query` without loading documents.
    pub fn count(&self, query: &str) -> Result<CountResult, IndexError> {
        let snapshot = self.snapshot()?;
        let syntax = QuerySyntax::detect(query);
        let compiled = self.compile(&snapshot, syntax, query)?;
        let collected = self.collect(&snapshot, &compiled, 0, CountMode::Exact)?;
        Ok(CountResult {
            type_name: self.searchable.name().to_string(),
            total_hits: collected.total,
            query_type: QueryType::from(syntax),
        })
    }

    /// Returns the single permitted hit of `query`, if any.
    ///
    /// Fails with [`IndexError::TooManyResults`] when several documents match.
    pub fn find_one(&self, query: &str) -> Result<Option<Hit>, IndexError> {
        let single = self.clone().start(0).limit(1).count_mode(CountMode::Exact);
        let mut result = single.execute(query)?;
        if result.total_hits > 1 {
            return Err(IndexError::TooManyResults {
                count: result.total_hits,
            });
        }
        Ok(result.hits.pop())
    }

    /// Opens a read snapshot of the searched index.
    fn snapshot(&self) -> Result<ReadSnapshot, IndexError> {
        self.manager
            .open_for_read(&self.searchable, &self.index, &self.options)
    }

    /// Compiles `query` for the snapshot's schema.
    fn compile(
        &self,
        snapshot: &ReadSnapshot,
        syntax: QuerySyntax,
        query: &str,
    ) -> Result<CompiledQuery, IndexError> {
        QueryCompiler::new(snapshot.schema(), snapshot.tokenizers()).compile(
            syntax,
            query,
            &self.filters,
        )
    }

    /// Collects the best `window` permitted candidates.
    fn collect(
        &self,
        snapshot: &ReadSnapshot,
        compiled: &CompiledQuery,
        window: usize,
        mode: CountMode,
    ) -> Result<CollectedHits, IndexError> {
        let collector = PermissionCollector::new(Arc::clone(&self.permission), window, mode);
        snapshot
            .searcher()
            .search(compiled.query.as_ref(), &collector)
            .map_err(|e| IndexError::search(&e))
    }

    /// Loads one candidate and turns it into a hit, or `None` when its id is unreadable.
    fn hit(
        &self,
        snapshot: &ReadSnapshot,
        terms: &MatchedTerms,
        highlighter: &Highlighter,
        candidate: &Candidate,
    ) -> Result<Option<Hit>, IndexError> {
        let doc: TantivyDocument = snapshot
            .searcher()
            .doc(candidate.address())
            .map_err(|e| IndexError::search(&e))?;
        let schema = snapshot.schema();
        let Some(id) = stored_id(schema, &doc) else {
            warn!(address = ?candidate.address(), "skipping document without a readable id");
            return Ok(None);
        };

        let mut fields = BTreeMap::new();
        for mapped in schema.fields() {
            if !mapped.descriptor.stored {
                continue;
            }
            let Some(value) = stored_value(mapped, &doc) else {
                continue;
            };
            let name = &mapped.descriptor.name;
            let mut field = None;
            if mapped.descriptor.highlighted
                && let (Some(field_terms), FieldValue::Text(text)) = (terms.field(name), &value)
                && let Some(analyzer) = snapshot.tokenizers().get(mapped.analyzer)
            {
                let fragments = highlighter.highlight(
                    field_terms,
                    &analyzer,
                    mapped.descriptor.analyzer,
                    text,
                );
                if !fragments.is_empty() {
                    field = Some(HitField::Highlighted(fragments));
                }
            }
            fields.insert(name.clone(), field.unwrap_or(HitField::Value(value)));
        }

        Ok(Some(Hit {
            id: id.main().to_string(),
            score: candidate.score,
            fields,
            scopes: id.scopes().clone(),
        }))
    }
}
