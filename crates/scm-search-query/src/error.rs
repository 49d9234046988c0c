//! Query errors.
//!
//! The lexer and parser report their own small error types; [`QueryError`] is what callers
//! see. It keeps the query text so the failure can be shown with a caret under the offending
//! byte, followed by a hint for the usual mistakes.

use std::fmt;

use thiserror::Error;

/// Hints keyed by a fragment of the error message.
const HINTS: &[(&str, &str)] = &[
    ("unclosed quote", "close the phrase with a second '\"'"),
    ("unclosed range", "ranges look like [from TO to] or {from TO to}"),
    ("closing parenthesis", "every '(' needs a matching ')'"),
    ("AND/OR", "AND and OR join two clauses, e.g. 'holmes OR watson'"),
    (
        "field name missing",
        "put a field name before the colon, e.g. 'name:holmes', or escape it as '\\:'",
    ),
    ("fuzzy", "use a trailing '*' to match word variants, e.g. 'hol*'"),
    (
        "unknown field",
        "only fields declared by the searched type can be used as prefixes",
    ),
];

/// Tokenization failure at a byte offset of the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at byte {position})")]
pub struct LexError {
    /// What went wrong.
    pub message: String,
    /// Byte offset into `input`.
    pub position: usize,
    /// Input being tokenized.
    pub input: String,
}

impl LexError {
    /// Creates a lexer error for `input`.
    pub fn new(message: impl Into<String>, position: usize, input: &str) -> Self {
        Self {
            message: message.into(),
            position,
            input: input.to_string(),
        }
    }
}

/// Grammar failure, located by token index when known.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    /// What went wrong.
    pub message: String,
    /// Index of the offending token.
    pub token_index: Option<usize>,
}

impl ParseError {
    /// Creates a parse error.
    pub fn new(message: impl Into<String>, token_index: Option<usize>) -> Self {
        Self {
            message: message.into(),
            token_index,
        }
    }
}

/// Stage at which a query was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryErrorKind {
    /// The input could not be split into tokens.
    #[error("{message}")]
    Lex {
        /// What went wrong.
        message: String,
        /// Byte offset into the query.
        position: usize,
    },
    /// The tokens do not form a query.
    #[error("{message}")]
    Parse {
        /// What went wrong.
        message: String,
        /// Index of the offending token.
        token_index: Option<usize>,
    },
    /// The query is well formed but cannot run against the searched type.
    #[error("{message}")]
    Compile {
        /// What went wrong.
        message: String,
    },
}

/// A rejected query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct QueryError {
    /// Stage and message.
    #[source]
    pub kind: QueryErrorKind,
    /// Query text, once known.
    pub query: Option<String>,
}

impl QueryError {
    /// Creates a tokenization error.
    pub fn lex(message: impl Into<String>, position: usize, query: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Lex {
                message: message.into(),
                position,
            },
            query: Some(query.into()),
        }
    }

    /// Creates a grammar error.
    pub fn parse(message: impl Into<String>, token_index: Option<usize>) -> Self {
        Self {
            kind: QueryErrorKind::Parse {
                message: message.into(),
                token_index,
            },
            query: None,
        }
    }

    /// Creates an error for a query the index cannot evaluate.
    pub fn compile(message: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Compile {
                message: message.into(),
            },
            query: None,
        }
    }

    /// Attaches the query text.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Returns the bare message.
    pub fn message(&self) -> &str {
        match &self.kind {
            QueryErrorKind::Lex { message, .. }
            | QueryErrorKind::Parse { message, .. }
            | QueryErrorKind::Compile { message } => message,
        }
    }

    /// Returns a hint for common mistakes.
    pub fn suggestion(&self) -> Option<&'static str> {
        let message = self.message();
        HINTS
            .iter()
            .find(|(needle, _)| message.contains(needle))
            .map(|(_, hint)| *hint)
    }

    /// Byte offset the caret points at.
    fn caret(&self) -> Option<usize> {
        match (&self.kind, &self.query) {
            (QueryErrorKind::Lex { position, .. }, Some(query)) => Some((*position).min(query.len())),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            QueryErrorKind::Compile { .. } => write!(f, "invalid query: {}", self.kind)?,
            _ => write!(f, "query syntax error: {}", self.kind)?,
        }
        if let Some(query) = &self.query {
            write!(f, "\n  {query}")?;
            if let Some(offset) = self.caret() {
                let width = query.get(..offset).map_or(offset, |head| head.chars().count());
                write!(f, "\n  {:width$}^", "")?;
            }
        }
        if let Some(hint) = self.suggestion() {
            write!(f, "\nhint: {hint}")?;
        }
        Ok(())
    }
}

impl From<LexError> for QueryError {
    fn from(err: LexError) -> Self {
        Self::lex(err.message, err.position, err.input)
    }
}

impl From<ParseError> for QueryError {
    fn from(err: ParseError) -> Self {
        Self::parse(err.message, err.token_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_points_at_lex_position() {
        let err = QueryError::from(LexError::new("unexpected ':' (field name missing)", 3, "ab :c"));
        let rendered = err.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "query syntax error: unexpected ':' (field name missing)");
        assert_eq!(lines[1], "  ab :c");
        assert_eq!(lines[2], "     ^");
        assert!(lines[3].starts_with("hint: put a field name"));
    }

    #[test]
    fn caret_counts_characters() {
        let err = QueryError::lex("unclosed quote", 3, "äb\"x");
        assert!(err.to_string().contains("\n    ^"));
    }

    #[test]
    fn parse_errors_take_the_query_later() {
        let err = QueryError::from(ParseError::new("expected closing parenthesis", Some(2)))
            .with_query("(holmes");
        assert_eq!(err.query.as_deref(), Some("(holmes"));
        assert!(matches!(
            err.kind,
            QueryErrorKind::Parse {
                token_index: Some(2),
                ..
            }
        ));
        let rendered = err.to_string();
        assert!(rendered.contains("  (holmes"));
        assert!(!rendered.contains('^'));
        assert!(rendered.contains("hint: every '('"));
    }

    #[test]
    fn compile_errors_are_not_syntax_errors() {
        let err = QueryError::compile("unknown field 'color'");
        assert_eq!(err.message(), "unknown field 'color'");
        let rendered = err.to_string();
        assert!(rendered.starts_with("invalid query: unknown field 'color'"));
        assert!(rendered.contains("declared by the searched type"));
    }

    #[test]
    fn unmatched_messages_have_no_hint() {
        let err = QueryError::parse("empty query group", None);
        assert!(err.suggestion().is_none());
        assert_eq!(err.to_string(), "query syntax error: empty query group");
    }
}
