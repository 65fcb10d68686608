//! Type definitions for the query pipeline
//!
//! Raw input text is normalized into a [`Query`] before it is used as a cache
//! key or passed to a suggestion source, so that "  John" and "john" share
//! one cache entry and one lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered list of suggestions produced for one query
pub type SuggestionList = Vec<String>;

/// A normalized (trimmed, lower-cased), non-empty query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Query(String);

impl Query {
    /// Normalize raw input text.
    ///
    /// Returns `None` when the text is empty after trimming; the controller
    /// treats that as an empty input event. Whitespace-only text therefore
    /// clears the term instead of issuing a lookup that would match every
    /// entry.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    /// Get the normalized query text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Query {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Query {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Query::parse(&value).ok_or_else(|| format!("query '{value}' is empty after trimming"))
    }
}

impl From<Query> for String {
    fn from(query: Query) -> Self {
        query.0
    }
}
