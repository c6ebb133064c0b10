//! Shared document types.
//!
//! Documents are JSON objects. Keys are plain strings scoped to a collection,
//! and every successful mutation returns a [`Cas`] token.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored document body.
pub type Document = serde_json::Map<String, Value>;

/// Compare-and-swap token returned by a successful mutation.
///
/// A token of zero never identifies a stored revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cas(pub u64);

impl Cas {
    /// Returns `true` if this token identifies a stored revision.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl From<u64> for Cas {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document together with the key it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedDocument {
    /// Document key within its collection.
    pub key: String,
    /// Document body.
    pub document: Document,
}

/// Conjunction of field-equality clauses used by predicate scans.
///
/// An empty filter matches every document in the collection.
///
/// ```
/// use authstore_storage::Filter;
///
/// let filter = Filter::all().eq("algorithm", "RS256");
/// assert_eq!(filter.clauses().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// Returns a filter matching every document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds a `field == value` clause.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// Returns the clauses of this filter.
    #[must_use]
    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// Returns `true` if `document` satisfies every clause.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|(field, value)| document.get(field) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::all().matches(&doc(json!({"a": 1}))));
        assert!(Filter::all().matches(&Document::new()));
    }

    #[test]
    fn test_filter_requires_every_clause() {
        let filter = Filter::all().eq("algorithm", "RS256").eq("id", "k1");

        assert!(filter.matches(&doc(json!({"algorithm": "RS256", "id": "k1", "x": 0}))));
        assert!(!filter.matches(&doc(json!({"algorithm": "RS256", "id": "k2"}))));
        assert!(!filter.matches(&doc(json!({"id": "k1"}))));
    }

    #[test]
    fn test_filter_compares_json_types() {
        let filter = Filter::all().eq("created_at", 10);
        assert!(filter.matches(&doc(json!({"created_at": 10}))));
        assert!(!filter.matches(&doc(json!({"created_at": "10"}))));
    }

    #[test]
    fn test_cas_validity() {
        assert!(!Cas(0).is_valid());
        assert!(Cas::from(7).is_valid());
        assert_eq!(Cas(7).to_string(), "7");
    }
}
