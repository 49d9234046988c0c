//! Detection of the query style a user typed.
//!
//! Plain words are answered with a ranked best-guess search; anything that uses query syntax
//! is treated as an exact query and parsed strictly.

use crate::lexer::{Token, tokenize};

/// The style of a query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySyntax {
    /// Plain words: analyzed and matched with implicit trailing wildcards.
    BestGuess,
    /// Structured query syntax: parsed and evaluated as written.
    Exact,
}

impl QuerySyntax {
    /// Detects the style of `input`.
    ///
    /// Input that does not even tokenize is reported as [`QuerySyntax::Exact`], so the parse
    /// error surfaces to the caller instead of being silently treated as words.
    pub fn detect(input: &str) -> Self {
        if input.contains('\\') {
            return Self::Exact;
        }
        match tokenize(input) {
            Ok(tokens) if tokens.iter().all(|t| matches!(t, Token::Term(_))) => Self::BestGuess,
            _ => Self::Exact,
        }
    }
}
