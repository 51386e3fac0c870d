//! Structured evidence values with deterministic serialization.
//!
//! Evidence payloads are free-form in shape but closed in type: a value is
//! either a scalar, a sequence, or a string-keyed map. Maps are ordered
//! (`BTreeMap`) so the canonical serialization of a value is stable and the
//! hashes computed over it are reproducible.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A structured evidence value.
///
/// This is the payload type used by every forensic record in the platform:
/// evidence events, health check evidence, impact assessment evidence, and
/// rollback step data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvidenceValue {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    String(String),
    /// Ordered sequence of values.
    Seq(Vec<EvidenceValue>),
    /// String-keyed map with stable iteration order.
    Map(BTreeMap<String, EvidenceValue>),
}

impl EvidenceValue {
    /// Creates an empty map value.
    #[must_use]
    pub fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Inserts an entry if this value is a map; otherwise does nothing.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<EvidenceValue>) -> Self {
        if let Self::Map(entries) = &mut self {
            entries.insert(key.into(), value.into());
        }
        self
    }

    /// Returns the entry for `key` if this value is a map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&EvidenceValue> {
        match self {
            Self::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a number, if it is numeric.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number of entries for maps and sequences, 0 otherwise.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Map(entries) => entries.len(),
            Self::Seq(items) => items.len(),
            _ => 0,
        }
    }

    /// Returns true if this is an empty map or sequence, or a scalar.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes the value to its canonical JSON form.
    ///
    /// Map keys are emitted in sorted order, so two equal values always
    /// produce identical bytes. This is the form every forensic hash in
    /// the platform is computed over.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }
}

impl Default for EvidenceValue {
    fn default() -> Self {
        Self::Null
    }
}

impl From<bool> for EvidenceValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for EvidenceValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for EvidenceValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<u64> for EvidenceValue {
    fn from(value: u64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<usize> for EvidenceValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for EvidenceValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EvidenceValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<V: Into<EvidenceValue>> From<Vec<V>> for EvidenceValue {
    fn from(values: Vec<V>) -> Self {
        Self::Seq(values.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, EvidenceValue>> for EvidenceValue {
    fn from(entries: BTreeMap<String, EvidenceValue>) -> Self {
        Self::Map(entries)
    }
}
