//! In-memory result cache keyed by normalized query
//!
//! Entries are only ever added. An empty result list is never stored since it
//! may reflect a transient backend state, and the first list stored for a key
//! stays authoritative for the lifetime of the cache.

use std::collections::HashMap;

use crate::search::types::{Query, SuggestionList};

/// Memo of previously fetched suggestion lists
#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: HashMap<Query, SuggestionList>,
}

impl QueryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache pre-seeded with entries.
    ///
    /// Seeds go through [`QueryCache::put`], so blank keys and empty lists are
    /// skipped and the first occurrence of a key wins.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, SuggestionList)>,
        K: AsRef<str>,
    {
        let mut cache = Self::new();
        for (key, list) in entries {
            if let Some(query) = Query::parse(key.as_ref()) {
                cache.put(&query, list);
            }
        }
        cache
    }

    /// Look up a cached list
    pub fn get(&self, query: &Query) -> Option<&[String]> {
        self.entries.get(query).map(Vec::as_slice)
    }

    /// Check whether a query has a cached list
    pub fn contains(&self, query: &Query) -> bool {
        self.entries.contains_key(query)
    }

    /// Store a list for a query.
    ///
    /// Returns `true` when a new entry was inserted, `false` when the list was
    /// empty or the key was already present.
    pub fn put(&mut self, query: &Query, list: SuggestionList) -> bool {
        if list.is_empty() || self.entries.contains_key(query) {
            return false;
        }
        self.entries.insert(query.clone(), list);
        true
    }

    /// Number of cached queries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(raw: &str) -> Query {
        Query::parse(raw).unwrap()
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = QueryCache::new();
        assert!(cache.is_empty());

        assert!(cache.put(&query("jo"), vec!["John Doe".to_string()]));
        assert_eq!(cache.get(&query("jo")), Some(&["John Doe".to_string()][..]));
        assert_eq!(cache.get(&query("JO ")), Some(&["John Doe".to_string()][..]));
        assert!(cache.get(&query("ja")).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_empty_lists_are_not_cached() {
        let mut cache = QueryCache::new();
        assert!(!cache.put(&query("xyz"), Vec::new()));
        assert!(!cache.contains(&query("xyz")));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_first_write_wins() {
        let mut cache = QueryCache::new();
        assert!(cache.put(&query("al"), vec!["Alex Johnson".to_string()]));
        assert!(!cache.put(
            &query("al"),
            vec!["Alex Johnson".to_string(), "Daniel Garcia".to_string()]
        ));
        assert_eq!(cache.get(&query("al")).map(<[String]>::len), Some(1));
    }

    #[test]
    fn test_from_entries_skips_blank_and_empty() {
        let cache = QueryCache::from_entries([
            ("John", vec!["John Doe".to_string()]),
            ("  ", vec!["ignored".to_string()]),
            ("nobody", Vec::new()),
            ("john", vec!["Someone Else".to_string()]),
        ]);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&query("john")), Some(&["John Doe".to_string()][..]));
        assert!(!cache.contains(&query("nobody")));
    }
}
