//! Document identifiers.
//!
//! An [`Id`] names one indexed object: a primary id plus the ids of the containers ("scopes")
//! it lives in, such as the repository a commit belongs to. The canonical string form is
//! `main;scopeType:scopeId;...` with scope entries sorted by scope type and `;`, `:` and `\`
//! escaped with a backslash, so every id has exactly one spelling and parses back losslessly.

use std::{collections::BTreeMap, fmt, mem, str::FromStr};

use thiserror::Error;

/// Errors that can occur when parsing an identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The primary id is empty.
    #[error("id has an empty primary part")]
    EmptyMain,
    /// A scope entry lacks the `type:id` separator.
    #[error("scope entry '{0}' is missing ':'")]
    MissingScopeSeparator(String),
    /// A scope type appears twice.
    #[error("scope type '{0}' appears more than once")]
    DuplicateScope(String),
    /// The input ends with a lone backslash.
    #[error("id ends with a dangling escape")]
    DanglingEscape,
}

/// Identifier of an indexed object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    /// Primary id of the object itself.
    main: String,
    /// Container ids keyed by scope type.
    scopes: BTreeMap<String, String>,
}

impl Id {
    /// Creates an id without scopes.
    pub fn of(main: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            scopes: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) the container id for `scope_type`.
    #[must_use]
    pub fn and(mut self, scope_type: impl Into<String>, scope_id: impl Into<String>) -> Self {
        self.scopes.insert(scope_type.into(), scope_id.into());
        self
    }

    /// Returns the primary id.
    pub fn main(&self) -> &str {
        &self.main
    }

    /// Returns the container id for `scope_type`.
    pub fn scope(&self, scope_type: &str) -> Option<&str> {
        self.scopes.get(scope_type).map(String::as_str)
    }

    /// Returns all scopes ordered by scope type.
    pub fn scopes(&self) -> &BTreeMap<String, String> {
        &self.scopes
    }

    /// Parses the canonical form produced by `Display`.
    pub fn parse(input: &str) -> Result<Self, IdError> {
        let mut segments = split_unescaped(input, ';')?.into_iter();
        let main = segments.next().map(|s| unescape(&s)).unwrap_or_default();
        if main.is_empty() {
            return Err(IdError::EmptyMain);
        }

        let mut scopes = BTreeMap::new();
        for segment in segments {
            let parts = split_unescaped(&segment, ':')?;
            let [scope_type, scope_id] = parts.as_slice() else {
                return Err(IdError::MissingScopeSeparator(unescape(&segment)));
            };
            let scope_type = unescape(scope_type);
            if scopes.insert(scope_type.clone(), unescape(scope_id)).is_some() {
                return Err(IdError::DuplicateScope(scope_type));
            }
        }

        Ok(Self { main, scopes })
    }
}

/// Splits on `separator` where it is not escaped, keeping escapes in the pieces.
fn split_unescaped(input: &str, separator: char) -> Result<Vec<String>, IdError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let escaped = chars.next().ok_or(IdError::DanglingEscape)?;
            current.push(ch);
            current.push(escaped);
        } else if ch == separator {
            parts.push(mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    parts.push(current);
    Ok(parts)
}

/// Removes escape backslashes from a validated piece.
fn unescape(piece: &str) -> String {
    let mut out = String::with_capacity(piece.len());
    let mut chars = piece.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.extend(chars.next()),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes the characters that structure the canonical form.
///
/// Joining escaped pieces with `:` or `;` can never make two different pairs collide.
pub fn escape_part(piece: &str) -> String {
    let mut out = String::with_capacity(piece.len());
    for ch in piece.chars() {
        if matches!(ch, ';' | ':' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", escape_part(&self.main))?;
        for (scope_type, scope_id) in &self.scopes {
            write!(f, ";{}:{}", escape_part(scope_type), escape_part(scope_id))?;
        }
        Ok(())
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for Id {
    fn from(main: &str) -> Self {
        Self::of(main)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_id_formats_as_main() {
        assert_eq!(Id::of("hitchhiker").to_string(), "hitchhiker");
    }

    #[test]
    fn scopes_are_sorted_by_type() {
        let id = Id::of("c1").and("repository", "hog").and("branch", "main");
        assert_eq!(id.to_string(), "c1;branch:main;repository:hog");

        let other = Id::of("c1").and("branch", "main").and("repository", "hog");
        assert_eq!(id, other);
        assert_eq!(id.to_string(), other.to_string());
    }

    #[test]
    fn special_characters_are_escaped() {
        let id = Id::of("a;b").and("re:po", "x\\y");
        assert_eq!(id.to_string(), r"a\;b;re\:po:x\\y");
        assert_eq!(Id::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn parses_canonical_form() {
        let id: Id = "42;repository:hog;user:trillian".parse().unwrap();
        assert_eq!(id.main(), "42");
        assert_eq!(id.scope("repository"), Some("hog"));
        assert_eq!(id.scope("user"), Some("trillian"));
        assert_eq!(id.scope("group"), None);
    }

    #[test]
    fn invalid_ids_error() {
        assert_eq!(Id::parse(""), Err(IdError::EmptyMain));
        assert_eq!(Id::parse(";repo:x"), Err(IdError::EmptyMain));
        assert_eq!(
            Id::parse("a;repo"),
            Err(IdError::MissingScopeSeparator("repo".into()))
        );
        assert_eq!(
            Id::parse("a;r:x;r:y"),
            Err(IdError::DuplicateScope("r".into()))
        );
        assert_eq!(Id::parse("a\\"), Err(IdError::DanglingEscape));
    }

    #[test]
    fn and_replaces_existing_scope() {
        let id = Id::of("1").and("repository", "a").and("repository", "b");
        assert_eq!(id.scope("repository"), Some("b"));
        assert_eq!(id.scopes().len(), 1);
    }
}
