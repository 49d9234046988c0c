//! Marked-up snippets around matched terms.
//!
//! A compiled query records, per field, which analyzed tokens it matches. The highlighter
//! re-analyzes the stored text with the field's analyzer, finds the byte ranges of matching
//! tokens and wraps them in the configured markers.
//!
//! Natural-language fields yield fragments of roughly `fragment_size` bytes cut at
//! whitespace. Code fields yield whole source lines plus `context_lines` lines around each
//! match, keeping the original line breaks.

use std::{
    collections::HashMap,
    ops::Range,
};

use scm_search_config::HighlightSettings;
use scm_search_document::Analyzer;
use scm_search_query::Pattern;
use tantivy::tokenizer::{TextAnalyzer, TokenStream};

/// Matches analyzed tokens of the stored text.
#[derive(Debug, Clone, PartialEq)]
pub enum TermMatcher {
    /// The whole token.
    Exact(String),
    /// A token prefix (best-guess queries).
    Prefix(String),
    /// A wildcard pattern (exact queries).
    Pattern(Pattern),
}

impl TermMatcher {
    /// Checks one token.
    pub fn matches(&self, token: &str) -> bool {
        match self {
            Self::Exact(term) => token == term,
            Self::Prefix(prefix) => token.starts_with(prefix.as_str()),
            Self::Pattern(pattern) => pattern.matches(token),
        }
    }
}

/// Matchers for one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTerms {
    /// Matchers, without duplicates.
    matchers: Vec<TermMatcher>,
}

impl FieldTerms {
    /// Checks whether any matcher accepts `token`.
    pub fn matches(&self, token: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(token))
    }
}

/// Matchers of a compiled query, by field name.
#[derive(Debug, Clone, Default)]
pub struct MatchedTerms {
    /// Field name to matchers.
    fields: HashMap<String, FieldTerms>,
}

impl MatchedTerms {
    /// Records a matcher for a field.
    pub fn add(&mut self, field: &str, matcher: TermMatcher) {
        let terms = self.fields.entry(field.to_string()).or_default();
        if !terms.matchers.contains(&matcher) {
            terms.matchers.push(matcher);
        }
    }

    /// Returns the matchers of a field.
    pub fn field(&self, name: &str) -> Option<&FieldTerms> {
        self.fields.get(name)
    }
}

/// Produces highlighted fragments.
#[derive(Debug, Clone)]
pub struct Highlighter {
    /// Markers and fragment sizes.
    settings: HighlightSettings,
}

impl Highlighter {
    /// Creates a highlighter.
    pub fn new(settings: HighlightSettings) -> Self {
        Self { settings }
    }

    /// Highlights the tokens of `text` accepted by `terms`.
    ///
    /// Returns no fragments when nothing matches.
    pub fn highlight(
        &self,
        terms: &FieldTerms,
        analyzer: &TextAnalyzer,
        mode: Analyzer,
        text: &str,
    ) -> Vec<String> {
        let ranges = extract_match_ranges(analyzer, text, terms);
        if ranges.is_empty() || self.settings.max_fragments == 0 {
            return Vec::new();
        }
        match mode {
            Analyzer::Default => self.natural_fragments(text, &ranges),
            Analyzer::Code => self.code_fragments(text, &ranges),
        }
    }

    /// Fragments cut at whitespace around each group of matches.
    fn natural_fragments(&self, text: &str, ranges: &[Range<usize>]) -> Vec<String> {
        let size = self.settings.fragment_size.max(1);
        let mut fragments = Vec::new();
        let mut next = 0;

        while next < ranges.len() && fragments.len() < self.settings.max_fragments {
            let first = &ranges[next];
            let slack = size.saturating_sub(first.len()) / 2;
            let start = word_start(text, first.start.saturating_sub(slack));
            let mut end = word_end(text, (start + size).max(first.end).min(text.len()));

            let mut last = next;
            while last < ranges.len() && ranges[last].start < end {
                end = end.max(ranges[last].end);
                last += 1;
            }
            let end = word_end(text, end);

            let marked = self.mark(text, start..end, &ranges[next..last]);
            fragments.push(marked.trim().to_string());
            next = last;
        }
        fragments
    }

    /// Whole lines with context around each match.
    fn code_fragments(&self, text: &str, ranges: &[Range<usize>]) -> Vec<String> {
        let lines = line_spans(text);
        let context = self.settings.context_lines;

        let mut windows: Vec<Range<usize>> = Vec::new();
        for range in ranges {
            let line = lines.partition_point(|l| l.end < range.start);
            let from = line.saturating_sub(context);
            let to = (line + context).min(lines.len() - 1);
            match windows.last_mut() {
                Some(window) if from <= window.end + 1 => window.end = window.end.max(to),
                _ => windows.push(from..to),
            }
        }

        windows
            .into_iter()
            .take(self.settings.max_fragments)
            .map(|window| {
                let span = lines[window.start].start..lines[window.end].end;
                let inside: Vec<Range<usize>> = ranges
                    .iter()
                    .filter(|r| r.start >= span.start && r.end <= span.end)
                    .cloned()
                    .collect();
                self.mark(text, span, &inside)
            })
            .collect()
    }

    /// Copies `span` of `text`, wrapping every range in markers.
    fn mark(&self, text: &str, span: Range<usize>, ranges: &[Range<usize>]) -> String {
        let mut marked = String::with_capacity(span.len() + ranges.len() * 12);
        let mut cursor = span.start;
        for range in ranges {
            let start = range.start.max(cursor);
            let end = range.end.min(span.end);
            if start >= end {
                continue;
            }
            marked.push_str(&text[cursor..start]);
            marked.push_str(&self.settings.pre_tag);
            marked.push_str(&text[start..end]);
            marked.push_str(&self.settings.post_tag);
            cursor = end;
        }
        marked.push_str(&text[cursor..span.end]);
        marked
    }
}

/// Merges two sets of byte ranges, combining overlapping or adjacent ranges.
///
/// The result is sorted by start position with no overlaps.
pub fn merge_ranges(mut a: Vec<Range<usize>>, b: Vec<Range<usize>>) -> Vec<Range<usize>> {
    a.extend(b);
    if a.is_empty() {
        return a;
    }

    a.sort_by_key(|r| r.start);

    let mut merged = Vec::with_capacity(a.len());
    let mut current = a[0].clone();

    for range in a.into_iter().skip(1) {
        if range.start <= current.end {
            current.end = current.end.max(range.end);
        } else {
            merged.push(current);
            current = range;
        }
    }
    merged.push(current);

    merged
}

/// Extracts byte ranges of tokens in `body` accepted by `terms`.
///
/// Offsets are relative to `body` and are sorted, non-overlapping and merged where adjacent.
pub fn extract_match_ranges(
    analyzer: &TextAnalyzer,
    body: &str,
    terms: &FieldTerms,
) -> Vec<Range<usize>> {
    if terms.matchers.is_empty() || body.is_empty() {
        return Vec::new();
    }

    let mut analyzer = analyzer.clone();
    let mut stream = analyzer.token_stream(body);
    let mut ranges: Vec<Range<usize>> = Vec::new();

    while let Some(token) = stream.next() {
        if terms.matches(&token.text) {
            ranges.push(token.offset_from..token.offset_to);
        }
    }

    merge_ranges(ranges, Vec::new())
}

/// Byte spans of the lines of `text`, without line terminators.
fn line_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        if ch == '\n' {
            spans.push(start..i);
            start = i + 1;
        }
    }
    spans.push(start..text.len());
    spans
}

/// Moves `pos` back to the start of the word containing it.
fn word_start(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    match text[..pos].char_indices().rev().find(|(_, c)| c.is_whitespace()) {
        Some((i, c)) => i + c.len_utf8(),
        None => 0,
    }
}

/// Moves `pos` forward to the end of the word containing it.
fn word_end(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos += 1;
    }
    text[pos..]
        .find(char::is_whitespace)
        .map_or(text.len(), |i| pos + i)
}
