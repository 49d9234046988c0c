//! Query language for repository search.
//!
//! Two kinds of input are understood. Plain words are a *best guess* query, answered by the
//! index with ranked prefix matching. Anything using query syntax is an *exact* query, parsed
//! here into a [`QueryExpr`]:
//!
//! - **Terms**: `holmes`; escapes with `\` (`\-holmes`)
//! - **Phrases**: `"sherlock holmes"`
//! - **Wildcards**: `hol*`, `wat?on`
//! - **Ranges**: `[A TO Z]`, `{Holmes TO Watson}`, `count:[10 TO *]`
//! - **Boolean**: `a AND b`, `a OR b`, `+a`, `-a`, `!a`, `NOT a`; the default operator is OR
//! - **Grouping**: `(a b) AND c`
//! - **Fields**: `lastName:holmes`
//! - **Boosting**: `holmes^2.5`
//!
//! # Example
//!
//! ```
//! use scm_search_query::{QuerySyntax, parse};
//!
//! assert_eq!(QuerySyntax::detect("hol wat"), QuerySyntax::BestGuess);
//! assert_eq!(QuerySyntax::detect("name:holmes -watson"), QuerySyntax::Exact);
//!
//! let expr = parse("name:holmes -watson").unwrap();
//! assert!(expr.is_some());
//! ```

#![warn(missing_docs)]

mod ast;
mod error;
mod lexer;
mod parser;
mod syntax;

pub use ast::{Clause, Occur, Pattern, PatternPart, QueryExpr, Range, escape};
pub use error::{LexError, ParseError, QueryError, QueryErrorKind};
pub use lexer::{Token, tokenize};
pub use parser::parse;
pub use syntax::QuerySyntax;
