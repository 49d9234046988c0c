//! Query parser.
//!
//! Parses a token stream into a query AST using recursive descent.
//!
//! # Grammar
//!
//! ```text
//! query      → clause*
//! clause     → conjunction? modifier? (field_expr | primary) boost?
//! conjunction→ "AND" | "&&" | "OR" | "||"
//! modifier   → "+" | "-" | "!" | "NOT"
//! field_expr → FIELD_PREFIX primary
//! primary    → TERM | WILDCARD | PHRASE | RANGE | "(" query ")"
//! ```
//!
//! # Clause semantics
//!
//! The default operator is OR: unmarked clauses are optional. `+` makes a clause required and
//! `-`, `!` or `NOT` prohibits it. `AND` makes the clauses on both sides required, unless the
//! left one is already prohibited. `OR` between clauses is the default and changes nothing.

use std::mem;

use crate::{
    ast::{Clause, Occur, QueryExpr},
    error::{ParseError, QueryError},
    lexer::{Token, tokenize},
};

/// Conjunction preceding a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    /// No conjunction keyword.
    None,
    /// `AND` / `&&`.
    And,
    /// `OR` / `||`.
    Or,
}

/// Modifier preceding a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    /// No modifier.
    None,
    /// `+`.
    Required,
    /// `-`, `!` or `NOT`.
    Prohibited,
}

/// Recursive descent parser for query expressions.
struct Parser {
    /// Token stream to parse.
    tokens: Vec<Token>,
    /// Current position in token stream.
    position: usize,
}

impl Parser {
    /// Creates a new parser from a token stream.
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parses the token stream into a query expression.
    fn parse(mut self) -> Result<Option<QueryExpr>, ParseError> {
        if self.tokens.is_empty() {
            return Ok(None);
        }

        let expr = self.parse_query()?;

        if self.position < self.tokens.len() {
            return Err(ParseError::new(
                format!("unexpected token: {:?}", self.tokens[self.position]),
                Some(self.position),
            ));
        }

        Ok(Some(expr))
    }

    /// Parses: query → clause*
    ///
    /// Stops at the end of input or at a closing parenthesis.
    fn parse_query(&mut self) -> Result<QueryExpr, ParseError> {
        let mut clauses: Vec<Clause> = Vec::new();

        while !matches!(self.peek(), None | Some(Token::RParen)) {
            let conjunction = self.parse_conjunction();
            if conjunction != Conjunction::None && clauses.is_empty() {
                return Err(ParseError::new(
                    "unexpected AND/OR (needs expression before it)",
                    Some(self.position.saturating_sub(1)),
                ));
            }

            let modifier = self.parse_modifier();
            let expr = self.parse_clause_body()?;
            add_clause(&mut clauses, conjunction, modifier, expr);
        }

        if clauses.is_empty() {
            return Err(ParseError::new("empty query group", Some(self.position)));
        }

        Ok(QueryExpr::bool(clauses))
    }

    /// Consumes an optional conjunction keyword.
    fn parse_conjunction(&mut self) -> Conjunction {
        let conjunction = match self.peek() {
            Some(Token::And) => Conjunction::And,
            Some(Token::Or) => Conjunction::Or,
            _ => return Conjunction::None,
        };
        self.advance();
        conjunction
    }

    /// Consumes an optional modifier.
    fn parse_modifier(&mut self) -> Modifier {
        let modifier = match self.peek() {
            Some(Token::Required) => Modifier::Required,
            Some(Token::Not) => Modifier::Prohibited,
            _ => return Modifier::None,
        };
        self.advance();
        modifier
    }

    /// Parses a clause body: a field expression or a primary, with an optional boost suffix.
    fn parse_clause_body(&mut self) -> Result<QueryExpr, ParseError> {
        let expr = match self.peek().cloned() {
            Some(Token::FieldPrefix(name)) => {
                self.advance();
                let inner = self.parse_primary(Some(&name))?;
                QueryExpr::field(name, inner)
            }
            _ => self.parse_primary(None)?,
        };

        Ok(self.maybe_apply_boost(expr))
    }

    /// Parses: primary → TERM | WILDCARD | PHRASE | RANGE | "(" query ")"
    fn parse_primary(&mut self, field: Option<&str>) -> Result<QueryExpr, ParseError> {
        let token = self.peek().cloned();
        let expr = match token {
            Some(Token::Term(text)) => QueryExpr::Term(text),
            Some(Token::Wildcard(pattern)) => QueryExpr::Wildcard(pattern),
            Some(Token::Phrase(text)) => QueryExpr::Phrase(text),
            Some(Token::Range(range)) => QueryExpr::Range(range),
            Some(Token::LParen) => return self.parse_group(),
            Some(Token::FieldPrefix(_)) if field.is_some() => {
                return Err(ParseError::new(
                    "nested field prefixes are not allowed",
                    Some(self.position),
                ));
            }
            Some(Token::RParen) => {
                return Err(ParseError::new(
                    "unexpected closing parenthesis",
                    Some(self.position),
                ));
            }
            Some(Token::And) | Some(Token::Or) => {
                return Err(ParseError::new(
                    "unexpected AND/OR (needs expression after it)",
                    Some(self.position),
                ));
            }
            Some(Token::Not) | Some(Token::Required) => {
                return Err(ParseError::new("unexpected modifier", Some(self.position)));
            }
            Some(Token::Boost(_)) => {
                return Err(ParseError::new(
                    "unexpected boost (needs expression before it)",
                    Some(self.position),
                ));
            }
            Some(Token::FieldPrefix(_)) => {
                return Err(ParseError::new(
                    "unexpected field prefix",
                    Some(self.position),
                ));
            }
            None => {
                let message = match field {
                    Some(name) => format!("expected value after '{}:'", name),
                    None => "unexpected end of query".to_string(),
                };
                return Err(ParseError::new(message, None));
            }
        };

        self.advance();
        Ok(expr)
    }

    /// Parses a parenthesized group, consuming the surrounding parentheses.
    fn parse_group(&mut self) -> Result<QueryExpr, ParseError> {
        self.advance(); // consume (
        let inner = self.parse_query()?;

        if !self.check(&Token::RParen) {
            return Err(ParseError::new(
                "expected closing parenthesis",
                Some(self.position),
            ));
        }
        self.advance(); // consume )

        Ok(inner)
    }

    /// Checks if the current token is a boost operator and applies it if so.
    fn maybe_apply_boost(&mut self, expr: QueryExpr) -> QueryExpr {
        if let Some(Token::Boost(factor)) = self.peek().cloned() {
            self.advance();
            QueryExpr::boost(expr, factor)
        } else {
            expr
        }
    }

    /// Returns the current token without consuming it.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// Checks if the current token matches the given token.
    fn check(&self, token: &Token) -> bool {
        self.peek()
            .map(|t| mem::discriminant(t) == mem::discriminant(token))
            .unwrap_or(false)
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }
}

/// Appends a clause, applying the conjunction to the previous clause.
fn add_clause(
    clauses: &mut Vec<Clause>,
    conjunction: Conjunction,
    modifier: Modifier,
    expr: QueryExpr,
) {
    match clauses.last_mut() {
        Some(previous) if conjunction == Conjunction::And && previous.occur != Occur::MustNot => {
            previous.occur = Occur::Must;
        }
        _ => {}
    }

    let occur = match modifier {
        Modifier::Prohibited => Occur::MustNot,
        Modifier::Required => Occur::Must,
        Modifier::None if conjunction == Conjunction::And => Occur::Must,
        Modifier::None => Occur::Should,
    };

    clauses.push(Clause::new(occur, expr));
}

/// Parses a query string into an AST.
///
/// Returns `Ok(None)` for empty queries, `Ok(Some(expr))` for valid queries,
/// or `Err(QueryError)` for invalid syntax.
pub fn parse(input: &str) -> Result<Option<QueryExpr>, QueryError> {
    let tokens = tokenize(input).map_err(QueryError::from)?;
    Parser::new(tokens)
        .parse()
        .map_err(|e| QueryError::from(e).with_query(input))
}

#[cfg(test)]
mod tests {
    use std::ops::Bound;

    use super::*;
    use crate::ast::{Pattern, PatternPart, Range};

    fn term(s: &str) -> QueryExpr {
        QueryExpr::Term(s.into())
    }

    fn should(e: QueryExpr) -> Clause {
        Clause::new(Occur::Should, e)
    }

    fn must(e: QueryExpr) -> Clause {
        Clause::new(Occur::Must, e)
    }

    fn must_not(e: QueryExpr) -> Clause {
        Clause::new(Occur::MustNot, e)
    }

    fn bool_(clauses: Vec<Clause>) -> QueryExpr {
        QueryExpr::Bool(clauses)
    }

    #[test]
    fn empty_query() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn single_term() {
        assert_eq!(parse("holmes").unwrap(), Some(term("holmes")));
    }

    #[test]
    fn default_operator_is_or() {
        assert_eq!(
            parse("holmes watson").unwrap(),
            Some(bool_(vec![should(term("holmes")), should(term("watson"))]))
        );
    }

    #[test]
    fn and_requires_both_sides() {
        assert_eq!(
            parse("holmes AND hol").unwrap(),
            Some(bool_(vec![must(term("holmes")), must(term("hol"))]))
        );
    }

    #[test]
    fn and_chain_with_optional_tail() {
        assert_eq!(
            parse("a AND b c").unwrap(),
            Some(bool_(vec![must(term("a")), must(term("b")), should(term("c"))]))
        );
    }

    #[test]
    fn explicit_or_keeps_optional() {
        assert_eq!(
            parse("a OR b").unwrap(),
            Some(bool_(vec![should(term("a")), should(term("b"))]))
        );
    }

    #[test]
    fn not_prohibits() {
        assert_eq!(
            parse("watson NOT wat").unwrap(),
            Some(bool_(vec![should(term("watson")), must_not(term("wat"))]))
        );
    }

    #[test]
    fn and_not_keeps_prohibition() {
        assert_eq!(
            parse("watson AND NOT wat").unwrap(),
            Some(bool_(vec![must(term("watson")), must_not(term("wat"))]))
        );
    }

    #[test]
    fn plus_requires() {
        assert_eq!(
            parse("watson +wat").unwrap(),
            Some(bool_(vec![should(term("watson")), must(term("wat"))]))
        );
    }

    #[test]
    fn minus_and_bang_prohibit() {
        assert_eq!(
            parse("watson -wat !mor").unwrap(),
            Some(bool_(vec![
                should(term("watson")),
                must_not(term("wat")),
                must_not(term("mor"))
            ]))
        );
    }

    #[test]
    fn lone_negation_stays_boolean() {
        assert_eq!(
            parse("-deprecated").unwrap(),
            Some(bool_(vec![must_not(term("deprecated"))]))
        );
    }

    #[test]
    fn grouping() {
        assert_eq!(
            parse("(a b) AND c").unwrap(),
            Some(bool_(vec![
                must(bool_(vec![should(term("a")), should(term("b"))])),
                must(term("c"))
            ]))
        );
    }

    #[test]
    fn field_with_term() {
        assert_eq!(
            parse("lastName:Holmes").unwrap(),
            Some(QueryExpr::field("lastName", term("Holmes")))
        );
    }

    #[test]
    fn field_with_group() {
        assert_eq!(
            parse("name:(a OR b)").unwrap(),
            Some(QueryExpr::field(
                "name",
                bool_(vec![should(term("a")), should(term("b"))])
            ))
        );
    }

    #[test]
    fn field_with_range() {
        assert_eq!(
            parse("count:{1 TO 5]").unwrap(),
            Some(QueryExpr::field(
                "count",
                QueryExpr::Range(Range {
                    lower: Bound::Excluded("1".into()),
                    upper: Bound::Included("5".into()),
                })
            ))
        );
    }

    #[test]
    fn wildcard_clause() {
        assert_eq!(
            parse("hol* wat").unwrap(),
            Some(bool_(vec![
                should(QueryExpr::Wildcard(Pattern::new(vec![
                    PatternPart::Literal("hol".into()),
                    PatternPart::AnyString
                ]))),
                should(term("wat"))
            ]))
        );
    }

    #[test]
    fn phrase_clause() {
        assert_eq!(
            parse("\"sherlock holmes\"").unwrap(),
            Some(QueryExpr::Phrase("sherlock holmes".into()))
        );
    }

    #[test]
    fn boost_on_field() {
        assert_eq!(
            parse("name:holmes^2").unwrap(),
            Some(QueryExpr::boost(
                QueryExpr::field("name", term("holmes")),
                2.0
            ))
        );
    }

    #[test]
    fn leading_and_is_error() {
        assert!(parse("AND holmes").is_err());
    }

    #[test]
    fn trailing_and_is_error() {
        let err = parse("holmes AND").unwrap_err();
        assert!(err.message().contains("unexpected end"));
    }

    #[test]
    fn missing_close_paren() {
        let err = parse("(holmes watson").unwrap_err();
        assert!(err.message().contains("closing parenthesis"));
    }

    #[test]
    fn stray_close_paren() {
        assert!(parse("holmes)").is_err());
    }

    #[test]
    fn empty_group() {
        assert!(parse("()").is_err());
    }

    #[test]
    fn field_without_value() {
        let err = parse("name:").unwrap_err();
        assert!(err.message().contains("name:"));
    }

    #[test]
    fn invalid_syntax_is_error() {
        assert!(parse(":~:~").is_err());
    }

    #[test]
    fn query_string_round_trip() {
        let inputs = [
            "holmes AND watson",
            "name:holmes^2 -wat",
            "count:[1 TO *] \"two words\"",
            "hol* OR (a b)",
        ];
        for input in inputs {
            let expr = parse(input).unwrap().unwrap();
            let rendered = expr.to_query_string();
            assert_eq!(parse(&rendered).unwrap().unwrap(), expr, "{rendered}");
        }
    }
}
