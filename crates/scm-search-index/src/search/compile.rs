//! Compiles query strings into Tantivy queries against one type's index.
//!
//! Best-guess input is analyzed per default field; every token matches as a term or as a
//! prefix. Exact input is parsed by `scm-search-query` and mapped clause by clause:
//! tokenized text is analyzed (several tokens form a disjunction), untokenized text matches
//! verbatim, enums and booleans match case-insensitively and numbers as `i64`.
//!
//! The user query is always restricted to the searched type and to every scope filter.

use std::ops::Bound;

use scm_search_document::FieldKind;
use scm_search_query::{
    Occur as ClauseOccur, Pattern, PatternPart, QueryError, QueryExpr, QuerySyntax, parse,
};
use tantivy::{
    Term,
    query::{
        BooleanQuery, BoostQuery, ConstScoreQuery, EmptyQuery, FuzzyTermQuery, Occur,
        PhraseQuery, Query, RangeQuery, RegexQuery, TermQuery,
    },
    schema::IndexRecordOption,
    tokenizer::{TokenStream, TokenizerManager},
};

use crate::{
    IndexError,
    encode::{scope_term, type_term},
    highlight::{MatchedTerms, TermMatcher},
    schema::{IndexSchema, MappedField},
};

/// A compiled query plus the terms it matches, for highlighting.
pub struct CompiledQuery {
    /// The Tantivy query.
    pub query: Box<dyn Query>,
    /// Matched terms per field.
    pub terms: MatchedTerms,
}

/// Fields a leaf expression is compiled against.
#[derive(Clone, Copy)]
enum Target<'a> {
    /// The default-query fields.
    Defaults,
    /// One explicitly named field.
    Field(&'a MappedField),
}

/// Compiles queries for one index.
pub struct QueryCompiler<'a> {
    /// Field handles of the index.
    schema: &'a IndexSchema,
    /// Analyzers registered with the index.
    tokenizers: &'a TokenizerManager,
    /// Terms collected for highlighting.
    terms: MatchedTerms,
}

impl<'a> QueryCompiler<'a> {
    /// Creates a compiler.
    pub fn new(schema: &'a IndexSchema, tokenizers: &'a TokenizerManager) -> Self {
        Self {
            schema,
            tokenizers,
            terms: MatchedTerms::default(),
        }
    }

    /// Compiles `input`, restricted to the type and to every `(scope type, scope id)` filter.
    pub fn compile(
        mut self,
        syntax: QuerySyntax,
        input: &str,
        filters: &[(String, String)],
    ) -> Result<CompiledQuery, IndexError> {
        let user_query = match syntax {
            QuerySyntax::BestGuess => self.best_guess(input),
            QuerySyntax::Exact => self.exact(input).map_err(|e| e.with_query(input))?,
        };

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![
            (Occur::Must, restriction(type_term(self.schema))),
            (Occur::Must, user_query),
        ];
        for (scope_type, scope_id) in filters {
            clauses.push((
                Occur::Must,
                restriction(scope_term(self.schema, scope_type, scope_id)),
            ));
        }

        Ok(CompiledQuery {
            query: Box::new(BooleanQuery::new(clauses)),
            terms: self.terms,
        })
    }

    /// Ranked term-or-prefix matching over the default fields.
    fn best_guess(&mut self, input: &str) -> Box<dyn Query> {
        let schema = self.schema;
        let trimmed = input.trim();
        let mut clauses = Vec::new();

        for field in schema.default_fields() {
            let boost = field.descriptor.boost;
            match field.descriptor.kind {
                FieldKind::Text => {
                    let tokens = if field.descriptor.tokenized {
                        self.analyze(field, input)
                    } else {
                        vec![(0, trimmed.to_string())]
                    };
                    for (_, token) in tokens {
                        if field.descriptor.tokenized {
                            self.terms
                                .add(&field.descriptor.name, TermMatcher::Prefix(token.clone()));
                        }
                        let term = Term::from_field_text(field.field, &token);
                        clauses.push((Occur::Should, term_or_prefix(term, boost)));
                    }
                }
                FieldKind::Enum | FieldKind::Boolean => {
                    if let Some(term) = keyword_term(field, trimmed) {
                        clauses.push((Occur::Should, boosted(term_query(term), boost)));
                    }
                }
                FieldKind::Integer | FieldKind::Timestamp => {
                    if let Ok(value) = trimmed.parse::<i64>() {
                        let term = Term::from_field_i64(field.field, value);
                        clauses.push((Occur::Should, boosted(term_query(term), boost)));
                    }
                }
            }
        }
        disjunction(clauses)
    }

    /// Parses and compiles query-language input.
    fn exact(&mut self, input: &str) -> Result<Box<dyn Query>, QueryError> {
        match parse(input)? {
            Some(expr) => self.expr(&expr, Target::Defaults),
            None => Ok(Box::new(EmptyQuery)),
        }
    }

    /// Compiles one expression.
    fn expr(&mut self, expr: &QueryExpr, target: Target<'a>) -> Result<Box<dyn Query>, QueryError> {
        match expr {
            QueryExpr::Bool(clauses) => {
                let mut compiled = Vec::with_capacity(clauses.len());
                for clause in clauses {
                    let occur = match clause.occur {
                        ClauseOccur::Must => Occur::Must,
                        ClauseOccur::Should => Occur::Should,
                        ClauseOccur::MustNot => Occur::MustNot,
                    };
                    compiled.push((occur, self.expr(&clause.expr, target)?));
                }
                Ok(Box::new(BooleanQuery::new(compiled)))
            }
            QueryExpr::Field { name, expr } => {
                let schema = self.schema;
                let field = schema
                    .field(name)
                    .ok_or_else(|| QueryError::compile(format!("unknown field '{name}'")))?;
                self.expr(expr, Target::Field(field))
            }
            QueryExpr::Boost { expr, factor } => {
                Ok(Box::new(BoostQuery::new(self.expr(expr, target)?, *factor)))
            }
            leaf => self.leaf(leaf, target),
        }
    }

    /// Compiles a term, phrase, wildcard or range against its target fields.
    fn leaf(&mut self, expr: &QueryExpr, target: Target<'a>) -> Result<Box<dyn Query>, QueryError> {
        match target {
            Target::Field(field) => Ok(self
                .on_field(expr, field, true)?
                .unwrap_or_else(|| disjunction(Vec::new()))),
            Target::Defaults => {
                let schema = self.schema;
                let mut clauses = Vec::new();
                for field in schema.default_fields() {
                    if let Some(query) = self.on_field(expr, field, false)? {
                        clauses.push((Occur::Should, query));
                    }
                }
                Ok(disjunction(clauses))
            }
        }
    }

    /// Compiles a leaf for one field.
    ///
    /// Returns `None` when a default field cannot hold the value; an explicitly named field
    /// reports an error instead.
    fn on_field(
        &mut self,
        expr: &QueryExpr,
        field: &MappedField,
        explicit: bool,
    ) -> Result<Option<Box<dyn Query>>, QueryError> {
        if !field.descriptor.searchable {
            return mismatch(explicit, || {
                format!("field '{}' is not searchable", field.descriptor.name)
            });
        }
        match expr {
            QueryExpr::Term(text) => self.term(field, text, explicit),
            QueryExpr::Phrase(text) => self.phrase(field, text, explicit),
            QueryExpr::Wildcard(pattern) => self.wildcard(field, pattern, explicit),
            QueryExpr::Range(range) => range_query(field, &range.lower, &range.upper, explicit),
            QueryExpr::Bool(_) | QueryExpr::Field { .. } | QueryExpr::Boost { .. } => {
                Err(QueryError::compile("unexpected compound expression"))
            }
        }
    }

    /// Compiles a single term.
    fn term(
        &mut self,
        field: &MappedField,
        text: &str,
        explicit: bool,
    ) -> Result<Option<Box<dyn Query>>, QueryError> {
        match field.descriptor.kind {
            FieldKind::Text if field.descriptor.tokenized => {
                let tokens = self.analyze(field, text);
                let mut clauses = Vec::with_capacity(tokens.len());
                for (_, token) in tokens {
                    self.terms
                        .add(&field.descriptor.name, TermMatcher::Exact(token.clone()));
                    let term = Term::from_field_text(field.field, &token);
                    clauses.push((Occur::Should, term_query(term)));
                }
                Ok(Some(disjunction(clauses)))
            }
            FieldKind::Text => Ok(Some(term_query(Term::from_field_text(field.field, text)))),
            FieldKind::Enum | FieldKind::Boolean => match keyword_term(field, text) {
                Some(term) => Ok(Some(term_query(term))),
                None => mismatch(explicit, || invalid_value(field, text)),
            },
            FieldKind::Integer | FieldKind::Timestamp => match text.parse::<i64>() {
                Ok(value) => Ok(Some(term_query(Term::from_field_i64(field.field, value)))),
                Err(_) => mismatch(explicit, || invalid_value(field, text)),
            },
        }
    }

    /// Compiles a quoted phrase.
    fn phrase(
        &mut self,
        field: &MappedField,
        text: &str,
        explicit: bool,
    ) -> Result<Option<Box<dyn Query>>, QueryError> {
        if field.descriptor.kind != FieldKind::Text || !field.descriptor.tokenized {
            return self.term(field, text, explicit);
        }
        let tokens = self.analyze(field, text);
        for (_, token) in &tokens {
            self.terms
                .add(&field.descriptor.name, TermMatcher::Exact(token.clone()));
        }
        let mut terms: Vec<(usize, Term)> = tokens
            .into_iter()
            .map(|(position, token)| (position, Term::from_field_text(field.field, &token)))
            .collect();
        let query: Box<dyn Query> = match terms.len() {
            0 => Box::new(EmptyQuery),
            1 => {
                let (_, term) = terms.remove(0);
                term_query(term)
            }
            _ => Box::new(PhraseQuery::new_with_offset(terms)),
        };
        Ok(Some(query))
    }

    /// Compiles a wildcard pattern.
    fn wildcard(
        &mut self,
        field: &MappedField,
        pattern: &Pattern,
        explicit: bool,
    ) -> Result<Option<Box<dyn Query>>, QueryError> {
        let pattern = match field.descriptor.kind {
            FieldKind::Text if !field.descriptor.tokenized => pattern.clone(),
            FieldKind::Text | FieldKind::Enum | FieldKind::Boolean => {
                pattern.map_literals(str::to_lowercase)
            }
            FieldKind::Integer | FieldKind::Timestamp => {
                return mismatch(explicit, || {
                    format!(
                        "wildcards are not supported on {} field '{}'",
                        field.descriptor.kind, field.descriptor.name
                    )
                });
            }
        };
        let query = RegexQuery::from_pattern(&to_regex(&pattern), field.field)
            .map_err(|e| QueryError::compile(format!("invalid wildcard '{pattern}': {e}")))?;
        if field.descriptor.tokenized {
            self.terms
                .add(&field.descriptor.name, TermMatcher::Pattern(pattern));
        }
        Ok(Some(Box::new(query)))
    }

    /// Runs `text` through the field's analyzer, returning positions and tokens.
    fn analyze(&self, field: &MappedField, text: &str) -> Vec<(usize, String)> {
        let Some(mut analyzer) = self.tokenizers.get(field.analyzer) else {
            return vec![(0, text.to_string())];
        };
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while let Some(token) = stream.next() {
            tokens.push((token.position, token.text.clone()));
        }
        tokens
    }
}

/// Compiles a range against one field.
fn range_query(
    field: &MappedField,
    lower: &Bound<String>,
    upper: &Bound<String>,
    explicit: bool,
) -> Result<Option<Box<dyn Query>>, QueryError> {
    let name = field.descriptor.name.clone();
    match field.descriptor.kind {
        FieldKind::Integer | FieldKind::Timestamp => {
            let parse = |bound: &Bound<String>| -> Option<Bound<i64>> {
                match bound {
                    Bound::Included(v) => v.parse().ok().map(Bound::Included),
                    Bound::Excluded(v) => v.parse().ok().map(Bound::Excluded),
                    Bound::Unbounded => Some(Bound::Unbounded),
                }
            };
            match (parse(lower), parse(upper)) {
                (Some(lower), Some(upper)) => {
                    Ok(Some(Box::new(RangeQuery::new_i64_bounds(name, lower, upper))))
                }
                _ => mismatch(explicit, || {
                    format!("range bounds of field '{name}' must be integers")
                }),
            }
        }
        FieldKind::Text | FieldKind::Enum | FieldKind::Boolean => {
            let verbatim = field.descriptor.kind == FieldKind::Text && !field.descriptor.tokenized;
            let normalize = |bound: &Bound<String>| -> Bound<String> {
                match bound {
                    Bound::Included(v) if verbatim => Bound::Included(v.clone()),
                    Bound::Excluded(v) if verbatim => Bound::Excluded(v.clone()),
                    Bound::Included(v) => Bound::Included(v.to_lowercase()),
                    Bound::Excluded(v) => Bound::Excluded(v.to_lowercase()),
                    Bound::Unbounded => Bound::Unbounded,
                }
            };
            let lower = normalize(lower);
            let upper = normalize(upper);
            Ok(Some(Box::new(RangeQuery::new_str_bounds(
                name,
                lower.as_ref().map(String::as_str),
                upper.as_ref().map(String::as_str),
            ))))
        }
    }
}

/// Builds the lowercased keyword term for an enum or boolean field.
fn keyword_term(field: &MappedField, text: &str) -> Option<Term> {
    let lowered = text.to_lowercase();
    if field.descriptor.kind == FieldKind::Boolean && lowered != "true" && lowered != "false" {
        return None;
    }
    Some(Term::from_field_text(field.field, &lowered))
}

/// Converts a wildcard pattern into an anchored regular expression.
fn to_regex(pattern: &Pattern) -> String {
    let mut regex = String::new();
    for part in &pattern.parts {
        match part {
            PatternPart::Literal(text) => {
                for ch in text.chars() {
                    if is_regex_meta(ch) {
                        regex.push('\\');
                    }
                    regex.push(ch);
                }
            }
            PatternPart::AnyChar => regex.push('.'),
            PatternPart::AnyString => regex.push_str(".*"),
        }
    }
    regex
}

/// Characters with special meaning in regular expressions.
fn is_regex_meta(ch: char) -> bool {
    matches!(
        ch,
        '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '#'
            | '&' | '-' | '~'
    )
}

/// Term or prefix match of one best-guess token, weighted by the field boost.
fn term_or_prefix(term: Term, boost: f32) -> Box<dyn Query> {
    let prefix = FuzzyTermQuery::new_prefix(term.clone(), 0, true);
    let clauses: Vec<(Occur, Box<dyn Query>)> = vec![
        (Occur::Should, boosted(term_query(term), boost)),
        (Occur::Should, boosted(Box::new(prefix), boost)),
    ];
    Box::new(BooleanQuery::new(clauses))
}

/// A scoring term query.
fn term_query(term: Term) -> Box<dyn Query> {
    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))
}

/// A non-scoring filter on a bookkeeping term.
fn restriction(term: Term) -> Box<dyn Query> {
    Box::new(ConstScoreQuery::new(
        Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
        0.0,
    ))
}

/// Wraps `query` in a boost unless the boost is neutral.
fn boosted(query: Box<dyn Query>, boost: f32) -> Box<dyn Query> {
    if (boost - 1.0).abs() < f32::EPSILON {
        query
    } else {
        Box::new(BoostQuery::new(query, boost))
    }
}

/// Combines optional clauses; no clause matches nothing.
fn disjunction(mut clauses: Vec<(Occur, Box<dyn Query>)>) -> Box<dyn Query> {
    match clauses.len() {
        0 => Box::new(EmptyQuery),
        1 => clauses.remove(0).1,
        _ => Box::new(BooleanQuery::new(clauses)),
    }
}

/// Skips a default field, or fails for an explicit one.
fn mismatch(
    explicit: bool,
    message: impl FnOnce() -> String,
) -> Result<Option<Box<dyn Query>>, QueryError> {
    if explicit {
        Err(QueryError::compile(message()))
    } else {
        Ok(None)
    }
}

/// Message for a value that does not fit the field kind.
fn invalid_value(field: &MappedField, text: &str) -> String {
    format!(
        "'{text}' is not a valid {} for field '{}'",
        field.descriptor.kind, field.descriptor.name
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scm_search_document::{FieldOptions, Indexable, TypeBuilder, derive_schema};
    use scm_search_query::QueryErrorKind;

    use super::*;
    use crate::analyzer::{self, IndexOptions};

    struct Person {
        first_name: String,
        last_name: String,
        age: i32,
        notes: String,
    }

    impl Indexable for Person {
        fn describe(builder: &mut TypeBuilder<Self>) {
            builder
                .field("firstName", |p: &Self| p.first_name.clone(), FieldOptions::new())
                .field(
                    "lastName",
                    |p: &Self| p.last_name.clone(),
                    FieldOptions::new().default_query().highlighted(),
                )
                .field("age", |p: &Self| p.age, FieldOptions::new())
                .field("notes", |p: &Self| p.notes.clone(), FieldOptions::new().stored_only());
        }
    }

    fn compile(syntax: QuerySyntax, input: &str) -> Result<CompiledQuery, IndexError> {
        let typed = derive_schema::<Person>().unwrap();
        let schema = IndexSchema::new(Arc::clone(typed.searchable_type()));
        let tokenizers = TokenizerManager::default();
        analyzer::register(&tokenizers, &IndexOptions::Default);
        QueryCompiler::new(&schema, &tokenizers).compile(syntax, input, &[])
    }

    fn compile_error(input: &str) -> QueryError {
        match compile(QuerySyntax::Exact, input) {
            Err(IndexError::Query(err)) => err,
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error for {input}"),
        }
    }

    #[test]
    fn unknown_field_is_a_compile_error() {
        let err = compile_error("nickname:zaphod");
        assert!(matches!(err.kind, QueryErrorKind::Compile { .. }));
        assert!(err.message().contains("nickname"));
        assert_eq!(err.query.as_deref(), Some("nickname:zaphod"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn malformed_input_is_a_query_error() {
        compile_error(":~:~");
    }

    #[test]
    fn explicit_fields_validate_values() {
        assert!(compile_error("age:old").message().contains("integer"));
        assert!(compile_error("notes:anything").message().contains("not searchable"));
        assert!(compile_error("age:4*").message().contains("wildcard"));
        assert!(compile(QuerySyntax::Exact, "age:[10 TO *]").is_ok());
        assert!(compile_error("age:[ten TO 20]").message().contains("integers"));
    }

    #[test]
    fn default_fields_skip_unfitting_values() {
        assert!(compile(QuerySyntax::Exact, "42 OR true").is_ok());
    }

    #[test]
    fn best_guess_records_prefix_terms() {
        let compiled = compile(QuerySyntax::BestGuess, "Trillian McMi").unwrap();
        let terms = compiled.terms.field("lastName").unwrap();
        assert!(terms.matches("mcmillan"));
        assert!(terms.matches("trillian"));
        assert!(!terms.matches("dent"));
        assert!(compiled.terms.field("firstName").is_none());
    }

    #[test]
    fn exact_records_terms_and_patterns() {
        let compiled = compile(QuerySyntax::Exact, "lastName:Dent OR Pre?ect firstName:arthur")
            .unwrap();
        let last = compiled.terms.field("lastName").unwrap();
        assert!(last.matches("dent"));
        assert!(last.matches("prefect"));
        assert!(!last.matches("dentist"));
        assert!(compiled.terms.field("firstName").unwrap().matches("arthur"));
    }

    #[test]
    fn regex_escapes_literals() {
        let pattern = Pattern::new(vec![
            PatternPart::Literal("a.b-c".into()),
            PatternPart::AnyChar,
            PatternPart::AnyString,
        ]);
        assert_eq!(to_regex(&pattern), r"a\.b\-c..*");
    }
}
