//! Raw scraped record - the input shape of the pipeline
//!
//! One record per scraped product page. Keys are whatever column names the
//! site's CSV export used; values are untyped strings. Records are immutable
//! once built; the mapper reads them through alias resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single scraped row: free-form attribute name to string value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord(BTreeMap<String, String>);

impl RawRecord {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert an attribute. Empty values are dropped so that alias
    /// resolution falls through to the next candidate column.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.0.insert(key.into(), value);
        }
    }

    /// Exact-key lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Resolve a declared field against this record by trying its alias list
    /// in order; first match wins. Exact header matches are preferred over
    /// ASCII-case-insensitive ones, since scraped headers vary in casing
    /// between sites but a schema may also declare both spellings.
    pub fn resolve(&self, aliases: &[String]) -> Option<&str> {
        for alias in aliases {
            if let Some(value) = self.get(alias) {
                return Some(value);
            }
        }
        for alias in aliases {
            if let Some(value) = self
                .0
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(alias))
                .map(|(_, value)| value.as_str())
            {
                return Some(value);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Self::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RawRecord {
        [("Name", "Caymus Cabernet"), ("Price", "59.99")]
            .into_iter()
            .collect()
    }

    #[test]
    fn resolve_prefers_exact_match_over_case_insensitive() {
        let mut rec = record();
        rec.insert("name", "lowercase duplicate");
        let aliases = vec!["Name".to_string()];
        assert_eq!(rec.resolve(&aliases), Some("Caymus Cabernet"));
    }

    #[test]
    fn resolve_falls_back_to_case_insensitive() {
        let rec = record();
        let aliases = vec!["Title".to_string(), "PRICE".to_string()];
        assert_eq!(rec.resolve(&aliases), Some("59.99"));
    }

    #[test]
    fn empty_values_are_not_stored() {
        let mut rec = RawRecord::new();
        rec.insert("Vintage", "  ");
        assert!(rec.get("Vintage").is_none());
    }
}
