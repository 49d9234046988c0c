//! Tokenizer for identifiers and source code.
//!
//! Splits on every non-alphanumeric character, on lower-to-upper case changes
//! (`simpleText`), before the last capital of an acronym (`HTTPServer` becomes `HTTP`,
//! `Server`) and between letters and digits (`simple42text`). Tokens keep their original case;
//! lowercasing is left to a filter.

use std::vec;

use tantivy::tokenizer::{Token, TokenStream, Tokenizer};

/// Tokenizer splitting camelCase, snake_case, punctuation and digit runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeTokenizer;

/// Token stream produced by [`CodeTokenizer`].
pub struct CodeTokenStream {
    /// Remaining tokens.
    tokens: vec::IntoIter<Token>,
    /// Current token.
    token: Token,
}

impl Tokenizer for CodeTokenizer {
    type TokenStream<'a> = CodeTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        let tokens: Vec<Token> = split_code(text)
            .into_iter()
            .enumerate()
            .map(|(position, (offset_from, offset_to))| Token {
                offset_from,
                offset_to,
                position,
                text: text[offset_from..offset_to].to_string(),
                position_length: 1,
            })
            .collect();
        CodeTokenStream {
            tokens: tokens.into_iter(),
            token: Token::default(),
        }
    }
}

impl TokenStream for CodeTokenStream {
    fn advance(&mut self) -> bool {
        match self.tokens.next() {
            Some(token) => {
                self.token = token;
                true
            }
            None => false,
        }
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }
}

/// Character class used to find token boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    /// Lowercase or uncased letter.
    Lower,
    /// Uppercase letter.
    Upper,
    /// Digit.
    Digit,
    /// Separator.
    Other,
}

impl Class {
    /// Classifies a character.
    fn of(ch: char) -> Self {
        if ch.is_uppercase() {
            Self::Upper
        } else if ch.is_alphabetic() {
            Self::Lower
        } else if ch.is_numeric() {
            Self::Digit
        } else {
            Self::Other
        }
    }
}

/// Returns the byte ranges of the tokens in `text`.
fn split_code(text: &str) -> Vec<(usize, usize)> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, &(offset, ch)) in chars.iter().enumerate() {
        let class = Class::of(ch);
        if class == Class::Other {
            if let Some(from) = start.take() {
                spans.push((from, offset));
            }
            continue;
        }
        let Some(from) = start else {
            start = Some(offset);
            continue;
        };
        let prev = Class::of(chars[i - 1].1);
        let next = chars.get(i + 1).map(|&(_, c)| Class::of(c));
        let boundary = match (prev, class) {
            (Class::Lower, Class::Upper) => true,
            (Class::Digit, Class::Lower | Class::Upper) | (Class::Lower | Class::Upper, Class::Digit) => {
                true
            }
            (Class::Upper, Class::Upper) => next == Some(Class::Lower),
            _ => false,
        };
        if boundary {
            spans.push((from, offset));
            start = Some(offset);
        }
    }
    if let Some(from) = start {
        spans.push((from, text.len()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        let mut tokenizer = CodeTokenizer;
        let mut stream = tokenizer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }

    #[test]
    fn splits_letters_and_digits() {
        assert_eq!(split("simple42text"), ["simple", "42", "text"]);
    }

    #[test]
    fn splits_camel_case() {
        assert_eq!(split("SimpleText"), ["Simple", "Text"]);
        assert_eq!(split("simpleText"), ["simple", "Text"]);
    }

    #[test]
    fn splits_snake_case_and_punctuation() {
        assert_eq!(split("simple_text"), ["simple", "text"]);
        assert_eq!(split("a.b(c, d);"), ["a", "b", "c", "d"]);
    }

    #[test]
    fn keeps_acronyms_together() {
        assert_eq!(split("HTTPServer"), ["HTTP", "Server"]);
        assert_eq!(split("parseURL"), ["parse", "URL"]);
    }

    #[test]
    fn offsets_point_into_source() {
        let text = "let fooBar = 1;";
        let mut tokenizer = CodeTokenizer;
        let mut stream = tokenizer.token_stream(text);
        let mut spans = Vec::new();
        while stream.advance() {
            let token = stream.token();
            spans.push(&text[token.offset_from..token.offset_to]);
        }
        assert_eq!(spans, ["let", "foo", "Bar", "1"]);
    }

    #[test]
    fn handles_non_ascii() {
        assert_eq!(split("größeWert"), ["größe", "Wert"]);
        assert!(split("").is_empty());
        assert!(split("--- ...").is_empty());
    }

    #[test]
    fn positions_are_sequential() {
        let mut tokenizer = CodeTokenizer;
        let mut stream = tokenizer.token_stream("oneTwo three");
        let mut positions = Vec::new();
        while stream.advance() {
            positions.push(stream.token().position);
        }
        assert_eq!(positions, [0, 1, 2]);
    }
}
