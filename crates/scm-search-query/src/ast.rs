//! Query abstract syntax tree.
//!
//! Represents parsed exact queries before they are compiled against a concrete index schema.

use std::{fmt, ops::Bound};

/// How a clause participates in its enclosing boolean query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// The clause must match (`+term`, or either side of `AND`).
    Must,
    /// The clause may match and contributes to the score.
    Should,
    /// The clause must not match (`-term`, `!term`, `NOT term`).
    MustNot,
}

impl Occur {
    /// Returns the prefix used when rendering the clause back into query syntax.
    fn prefix(self) -> &'static str {
        match self {
            Self::Must => "+",
            Self::Should => "",
            Self::MustNot => "-",
        }
    }
}

/// A single clause of a boolean query.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Occurrence requirement.
    pub occur: Occur,
    /// The clause expression.
    pub expr: QueryExpr,
}

impl Clause {
    /// Creates a clause.
    pub fn new(occur: Occur, expr: QueryExpr) -> Self {
        Self { occur, expr }
    }
}

/// One piece of a wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternPart {
    /// Literal text (escapes already resolved).
    Literal(String),
    /// `?`: exactly one character.
    AnyChar,
    /// `*`: any run of characters, including none.
    AnyString,
}

/// A wildcard pattern such as `hol*` or `wat?on`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Pattern pieces in order.
    pub parts: Vec<PatternPart>,
}

impl Pattern {
    /// Creates a pattern, merging adjacent literal pieces.
    pub fn new(parts: Vec<PatternPart>) -> Self {
        let mut merged: Vec<PatternPart> = Vec::with_capacity(parts.len());
        for part in parts {
            match (merged.last_mut(), part) {
                (Some(PatternPart::Literal(prev)), PatternPart::Literal(next)) => {
                    prev.push_str(&next);
                }
                (_, part) => merged.push(part),
            }
        }
        Self { parts: merged }
    }

    /// Returns the literal prefix before the first wildcard.
    pub fn literal_prefix(&self) -> &str {
        match self.parts.first() {
            Some(PatternPart::Literal(text)) => text,
            _ => "",
        }
    }

    /// Returns a copy of this pattern with every literal piece passed through `f`.
    pub fn map_literals(&self, f: impl Fn(&str) -> String) -> Self {
        Self::new(
            self.parts
                .iter()
                .map(|part| match part {
                    PatternPart::Literal(text) => PatternPart::Literal(f(text)),
                    other => other.clone(),
                })
                .collect(),
        )
    }

    /// Matches the pattern against a complete string.
    pub fn matches(&self, text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        match_parts(&self.parts, &chars)
    }
}

/// Backtracking matcher for wildcard pieces.
fn match_parts(parts: &[PatternPart], text: &[char]) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return text.is_empty();
    };
    match first {
        PatternPart::Literal(literal) => {
            let literal: Vec<char> = literal.chars().collect();
            text.starts_with(&literal) && match_parts(rest, &text[literal.len()..])
        }
        PatternPart::AnyChar => !text.is_empty() && match_parts(rest, &text[1..]),
        PatternPart::AnyString => (0..=text.len()).any(|skip| match_parts(rest, &text[skip..])),
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                PatternPart::Literal(text) => write!(f, "{}", escape(text))?,
                PatternPart::AnyChar => write!(f, "?")?,
                PatternPart::AnyString => write!(f, "*")?,
            }
        }
        Ok(())
    }
}

/// Range endpoints; an unbounded side was written as `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    /// Lower endpoint.
    pub lower: Bound<String>,
    /// Upper endpoint.
    pub upper: Bound<String>,
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, lower) = match &self.lower {
            Bound::Included(value) => ('[', escape(value)),
            Bound::Excluded(value) => ('{', escape(value)),
            Bound::Unbounded => ('[', "*".to_string()),
        };
        let (upper, close) = match &self.upper {
            Bound::Included(value) => (escape(value), ']'),
            Bound::Excluded(value) => (escape(value), '}'),
            Bound::Unbounded => ("*".to_string(), ']'),
        };
        write!(f, "{open}{lower} TO {upper}{close}")
    }
}

/// A parsed query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    /// A single search term (escapes resolved).
    Term(String),

    /// A term containing `*` or `?` wildcards.
    Wildcard(Pattern),

    /// A quoted phrase; split into terms by the analyzer of the target field.
    Phrase(String),

    /// A range such as `[a TO z]` or `{1 TO *]`.
    Range(Range),

    /// Boolean composition of clauses.
    Bool(Vec<Clause>),

    /// Field-scoped query: search only within a specific field.
    Field {
        /// Field name as declared for the searched type.
        name: String,
        /// Expression to match within that field.
        expr: Box<Self>,
    },

    /// Boosted query: multiplies the score of the inner expression.
    Boost {
        /// The expression to boost.
        expr: Box<Self>,
        /// The boost factor.
        factor: f32,
    },
}

impl QueryExpr {
    /// Creates a boolean expression.
    ///
    /// A lone clause that is not prohibited is unwrapped to its expression.
    pub fn bool(mut clauses: Vec<Clause>) -> Self {
        if clauses.len() == 1 && clauses[0].occur != Occur::MustNot {
            return clauses.remove(0).expr;
        }
        Self::Bool(clauses)
    }

    /// Creates a boosted expression.
    pub fn boost(expr: Self, factor: f32) -> Self {
        Self::Boost {
            expr: Box::new(expr),
            factor,
        }
    }

    /// Creates a field-scoped expression.
    pub fn field(name: impl Into<String>, expr: Self) -> Self {
        Self::Field {
            name: name.into(),
            expr: Box::new(expr),
        }
    }

    /// Formats the expression as a tree structure with the given indentation level.
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        match self {
            Self::Term(s) => writeln!(f, "{prefix}Term({s:?})"),
            Self::Wildcard(pattern) => writeln!(f, "{prefix}Wildcard({pattern})"),
            Self::Phrase(text) => writeln!(f, "{prefix}Phrase({text:?})"),
            Self::Range(range) => writeln!(f, "{prefix}Range({range})"),
            Self::Bool(clauses) => {
                writeln!(f, "{prefix}Bool")?;
                for clause in clauses {
                    writeln!(f, "{prefix}  {:?}", clause.occur)?;
                    clause.expr.fmt_tree(f, indent + 2)?;
                }
                Ok(())
            }
            Self::Field { name, expr } => {
                writeln!(f, "{prefix}Field({name:?})")?;
                expr.fmt_tree(f, indent + 1)
            }
            Self::Boost { expr, factor } => {
                writeln!(f, "{prefix}Boost({factor})")?;
                expr.fmt_tree(f, indent + 1)
            }
        }
    }

    /// Formats the expression back into query syntax.
    ///
    /// Parsing the output yields an equivalent expression.
    pub fn to_query_string(&self) -> String {
        match self {
            Self::Term(s) => escape(s),
            Self::Wildcard(pattern) => pattern.to_string(),
            Self::Phrase(text) => format!("\"{}\"", text.replace('"', "\\\"")),
            Self::Range(range) => range.to_string(),
            Self::Bool(clauses) => {
                let parts: Vec<String> = clauses
                    .iter()
                    .map(|c| format!("{}{}", c.occur.prefix(), c.expr.to_query_string()))
                    .collect();
                format!("({})", parts.join(" "))
            }
            Self::Field { name, expr } => format!("{}:{}", name, expr.to_query_string()),
            Self::Boost { expr, factor } => format!("{}^{}", expr.to_query_string(), factor),
        }
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// Characters that carry meaning in query syntax and must be escaped inside terms.
pub(crate) const SPECIAL_CHARS: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '*', '?', '&', '|',
];

/// Escapes every special character in `text` with a backslash.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if SPECIAL_CHARS.contains(&ch) || ch.is_whitespace() {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
