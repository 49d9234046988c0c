//! Query lexer (tokenizer).
//!
//! Converts an exact query string into a stream of tokens for the parser. Terms may contain
//! `-`, `+` and `!` after their first character, so `Trillian-McMillan` stays a single term
//! while `-watson` is a prohibited clause.

use std::{iter::Peekable, mem, ops::Bound, str::Chars};

use crate::{
    ast::{Pattern, PatternPart, Range},
    error::LexError,
};

/// A token in the query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A bare word without wildcards (escapes resolved).
    Term(String),

    /// A bare word containing `*` or `?`.
    Wildcard(Pattern),

    /// A quoted phrase (the quotes are stripped, content preserved).
    Phrase(String),

    /// A bracketed range.
    Range(Range),

    /// The `AND` keyword or `&&`.
    And,

    /// The `OR` keyword or `||`.
    Or,

    /// Prohibition: `NOT`, a leading `-` or a leading `!`.
    Not,

    /// Requirement: a leading `+`.
    Required,

    /// Left parenthesis.
    LParen,

    /// Right parenthesis.
    RParen,

    /// Field prefix (e.g., "name:" produces FieldPrefix("name")).
    FieldPrefix(String),

    /// Boost operator with factor (e.g., "^2.5" produces Boost(2.5)).
    Boost(f32),
}

/// Characters that terminate a bare word.
fn ends_word(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '(' | ')' | '"' | '^' | ':' | '[' | ']' | '{' | '}' | '~')
}

/// Word content accumulated while scanning a term.
#[derive(Default)]
struct WordBuilder {
    /// Pattern pieces collected so far.
    parts: Vec<PatternPart>,
    /// Literal text since the last wildcard.
    literal: String,
    /// Whether an unescaped `*` or `?` was seen.
    has_wildcard: bool,
    /// Whether any character was escaped.
    escaped: bool,
}

impl WordBuilder {
    /// Appends a literal character.
    fn push(&mut self, ch: char) {
        self.literal.push(ch);
    }

    /// Appends a wildcard piece.
    fn push_wildcard(&mut self, part: PatternPart) {
        if !self.literal.is_empty() {
            self.parts
                .push(PatternPart::Literal(mem::take(&mut self.literal)));
        }
        self.parts.push(part);
        self.has_wildcard = true;
    }

    /// Returns true if nothing was read.
    fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.literal.is_empty()
    }

    /// Returns the plain text of a word without wildcards.
    fn text(&self) -> &str {
        &self.literal
    }

    /// Converts the collected content into a term or wildcard token.
    fn into_token(mut self) -> Token {
        if self.has_wildcard {
            if !self.literal.is_empty() {
                self.parts.push(PatternPart::Literal(self.literal));
            }
            Token::Wildcard(Pattern::new(self.parts))
        } else {
            Token::Term(self.literal)
        }
    }
}

/// Tokenizes a query string.
struct Lexer<'a> {
    /// The original input string.
    input: &'a str,
    /// Character iterator with one-character lookahead.
    chars: Peekable<Chars<'a>>,
    /// Current byte position in input.
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    /// Creates an error at a specific position.
    fn error_at(&self, message: impl Into<String>, position: usize) -> LexError {
        LexError::new(message, position, self.input)
    }

    /// Tokenizes the entire input, returning all tokens or an error.
    fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    /// Returns the next token, or None if at end of input.
    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();

        let Some(&ch) = self.chars.peek() else {
            return Ok(None);
        };

        match ch {
            '"' => self.read_phrase(),
            '(' => {
                self.advance();
                Ok(Some(Token::LParen))
            }
            ')' => {
                self.advance();
                Ok(Some(Token::RParen))
            }
            '-' | '!' => {
                self.advance();
                Ok(Some(Token::Not))
            }
            '+' => {
                self.advance();
                Ok(Some(Token::Required))
            }
            '&' | '|' => self.read_symbolic_operator(ch),
            '[' | '{' => self.read_range(),
            '^' => self.read_boost(),
            ':' => Err(self.error_at("unexpected ':' (field name missing)", self.position)),
            '~' => Err(self.error_at(
                "fuzzy and proximity operators are not supported",
                self.position,
            )),
            ']' | '}' => Err(self.error_at("unexpected end of range", self.position)),
            _ => self.read_term_or_keyword(),
        }
    }

    /// Reads `&&` or `||`; a single `&` or `|` starts an ordinary term.
    fn read_symbolic_operator(&mut self, ch: char) -> Result<Option<Token>, LexError> {
        let mut ahead = self.input[self.position..].chars();
        ahead.next();
        if ahead.next() == Some(ch) {
            self.advance();
            self.advance();
            return Ok(Some(if ch == '&' { Token::And } else { Token::Or }));
        }
        self.read_term_or_keyword()
    }

    /// Reads a quoted phrase.
    fn read_phrase(&mut self) -> Result<Option<Token>, LexError> {
        let content = self.read_quoted()?;
        Ok(Some(Token::Phrase(content)))
    }

    /// Reads quoted content, resolving `\"` escapes.
    fn read_quoted(&mut self) -> Result<String, LexError> {
        let start_pos = self.position;
        self.advance(); // consume opening quote

        let mut content = String::new();

        loop {
            match self.chars.peek() {
                Some(&'"') => {
                    self.advance(); // consume closing quote
                    return Ok(content);
                }
                Some(&'\\') => {
                    self.advance();
                    match self.chars.peek() {
                        Some(&escaped) => {
                            content.push(escaped);
                            self.advance();
                        }
                        None => return Err(self.error_at("unclosed quote", start_pos)),
                    }
                }
                Some(&ch) => {
                    content.push(ch);
                    self.advance();
                }
                None => {
                    // Unclosed quote
                    return Err(self.error_at("unclosed quote", start_pos));
                }
            }
        }
    }

    /// Scans a bare word, stopping before any terminating character.
    fn read_word(&mut self) -> Result<WordBuilder, LexError> {
        let mut word = WordBuilder::default();

        while let Some(&ch) = self.chars.peek() {
            if ends_word(ch) {
                break;
            }
            match ch {
                '\\' => {
                    let escape_pos = self.position;
                    self.advance();
                    let Some(&escaped) = self.chars.peek() else {
                        return Err(self.error_at("dangling escape character", escape_pos));
                    };
                    word.push(escaped);
                    word.escaped = true;
                    self.advance();
                }
                '*' => {
                    word.push_wildcard(PatternPart::AnyString);
                    self.advance();
                }
                '?' => {
                    word.push_wildcard(PatternPart::AnyChar);
                    self.advance();
                }
                _ => {
                    word.push(ch);
                    self.advance();
                }
            }
        }

        Ok(word)
    }

    /// Reads a term, a keyword (AND, OR, NOT), or a field prefix.
    fn read_term_or_keyword(&mut self) -> Result<Option<Token>, LexError> {
        let start_pos = self.position;
        let word = self.read_word()?;

        if word.is_empty() {
            return Err(self.error_at("unexpected character", start_pos));
        }

        // Check for field prefix (word ending in colon)
        if self.chars.peek() == Some(&':') {
            self.advance(); // consume the colon
            if word.has_wildcard {
                return Err(self.error_at("field names cannot contain wildcards", start_pos));
            }
            return Ok(Some(Token::FieldPrefix(word.text().to_string())));
        }

        // Keywords are case sensitive, so "and" stays an ordinary word
        if !word.escaped && !word.has_wildcard {
            match word.text() {
                "AND" => return Ok(Some(Token::And)),
                "OR" => return Ok(Some(Token::Or)),
                "NOT" => return Ok(Some(Token::Not)),
                _ => {}
            }
        }

        Ok(Some(word.into_token()))
    }

    /// Reads one range endpoint: a quoted value, `*`, or a bare word.
    fn read_range_bound(&mut self, start_pos: usize) -> Result<Option<String>, LexError> {
        self.skip_whitespace();
        match self.chars.peek() {
            Some(&'"') => self.read_quoted().map(Some),
            Some(&']') | Some(&'}') | None => Err(self.error_at("incomplete range", start_pos)),
            Some(_) => {
                let word = self.read_word()?;
                if word.is_empty() {
                    return Err(self.error_at("incomplete range", start_pos));
                }
                if word.has_wildcard {
                    let is_open = matches!(word.parts.as_slice(), [PatternPart::AnyString])
                        && word.literal.is_empty();
                    if is_open {
                        return Ok(None);
                    }
                    return Err(self.error_at("wildcards are not allowed in ranges", start_pos));
                }
                Ok(Some(word.text().to_string()))
            }
        }
    }

    /// Reads `[lower TO upper]`, `{lower TO upper}` or a mix of both bracket styles.
    fn read_range(&mut self) -> Result<Option<Token>, LexError> {
        let start_pos = self.position;
        let inclusive_lower = self.chars.peek() == Some(&'[');
        self.advance(); // consume bracket

        let lower = self.read_range_bound(start_pos)?;

        self.skip_whitespace();
        let keyword = self.read_word()?;
        if keyword.has_wildcard || keyword.text() != "TO" {
            return Err(self.error_at("expected 'TO' in range", start_pos));
        }

        let upper = self.read_range_bound(start_pos)?;

        self.skip_whitespace();
        let inclusive_upper = match self.chars.peek() {
            Some(&']') => true,
            Some(&'}') => false,
            _ => return Err(self.error_at("unclosed range", start_pos)),
        };
        self.advance();

        Ok(Some(Token::Range(Range {
            lower: make_bound(lower, inclusive_lower),
            upper: make_bound(upper, inclusive_upper),
        })))
    }

    /// Reads a boost operator (^N or ^N.N).
    fn read_boost(&mut self) -> Result<Option<Token>, LexError> {
        let start_pos = self.position;
        self.advance(); // consume '^'

        let mut number = String::new();

        // Read digits and optional decimal point
        while let Some(&ch) = self.chars.peek() {
            if ch.is_ascii_digit() || (ch == '.' && !number.contains('.')) {
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if number.is_empty() {
            return Err(self.error_at("expected number after '^'", start_pos));
        }

        // Parse the number
        match number.parse::<f32>() {
            Ok(factor) => Ok(Some(Token::Boost(factor))),
            Err(_) => Err(self.error_at(format!("invalid boost value: {}", number), start_pos)),
        }
    }

    /// Skips whitespace characters.
    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Advances to the next character.
    fn advance(&mut self) {
        if let Some(ch) = self.chars.next() {
            self.position += ch.len_utf8();
        }
    }
}

/// Builds a range bound; a missing value (`*`) is unbounded.
fn make_bound(value: Option<String>, inclusive: bool) -> Bound<String> {
    match value {
        None => Bound::Unbounded,
        Some(value) if inclusive => Bound::Included(value),
        Some(value) => Bound::Excluded(value),
    }
}

/// Convenience function to tokenize a query string.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).tokenize()
}
