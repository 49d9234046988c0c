//! Per-field indexing options.

use serde::Serialize;

/// Whether a field's value is kept for retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stored {
    /// Always store.
    Yes,
    /// Index only; the value cannot be returned in hits.
    No,
    /// Store (the default for every kind).
    #[default]
    Default,
}

impl Stored {
    /// Resolves the setting to a flag.
    pub fn is_stored(self) -> bool {
        !matches!(self, Self::No)
    }
}

/// Analysis applied to a text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Analyzer {
    /// Natural language analysis, following the configured locale.
    #[default]
    Default,
    /// Source code: splits camelCase, snake_case, punctuation and digit runs.
    Code,
}

/// Indexing options for one field.
///
/// ```
/// use scm_search_document::{Analyzer, FieldOptions};
///
/// let options = FieldOptions::new().default_query().boost(2.0);
/// assert!(options.default_query);
///
/// let code = FieldOptions::new().analyzer(Analyzer::Code).highlighted();
/// assert!(code.highlighted);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOptions {
    /// Index-facing name; the declared name when `None`.
    pub name: Option<String>,
    /// Weight for ranked (best-guess) search.
    pub boost: f32,
    /// Whether the value is kept for retrieval.
    pub stored: Stored,
    /// Whether text is split into terms. Untokenized text matches only as a whole.
    pub tokenized: bool,
    /// Whether the field can be queried at all. Unsearchable fields are stored only.
    pub searchable: bool,
    /// Whether unqualified query terms search this field.
    pub default_query: bool,
    /// Text analysis strategy.
    pub analyzer: Analyzer,
    /// Whether hits return marked-up fragments for this field.
    pub highlighted: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            name: None,
            boost: 1.0,
            stored: Stored::Default,
            tokenized: true,
            searchable: true,
            default_query: false,
            analyzer: Analyzer::Default,
            highlighted: false,
        }
    }
}

impl FieldOptions {
    /// Returns the default options: stored, tokenized, searchable, boost 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the index-facing name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the ranking weight.
    #[must_use]
    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Sets the storage mode.
    #[must_use]
    pub fn stored(mut self, stored: Stored) -> Self {
        self.stored = stored;
        self
    }

    /// Indexes text as a single term.
    #[must_use]
    pub fn untokenized(mut self) -> Self {
        self.tokenized = false;
        self
    }

    /// Keeps the value for retrieval without indexing it.
    #[must_use]
    pub fn stored_only(mut self) -> Self {
        self.searchable = false;
        self.stored = Stored::Yes;
        self
    }

    /// Includes the field in unqualified queries.
    #[must_use]
    pub fn default_query(mut self) -> Self {
        self.default_query = true;
        self
    }

    /// Selects the text analysis strategy.
    #[must_use]
    pub fn analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Returns highlighted fragments for this field in hits.
    #[must_use]
    pub fn highlighted(mut self) -> Self {
        self.highlighted = true;
        self
    }
}
