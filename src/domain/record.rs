//! Opaque record and group key types.
//!
//! Records are owned by the ingestion collaborator; the aggregation core
//! only reads attributes and never mutates them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single attribute value: numeric or categorical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::Number(value)
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// An opaque mapping from attribute name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    attrs: BTreeMap<String, AttrValue>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: AttrValue) -> &mut Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// Numeric value of an attribute, if present and numeric.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.attrs.get(name) {
            Some(AttrValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Textual value of an attribute, if present and categorical.
    #[must_use]
    pub fn label(&self, name: &str) -> Option<String> {
        match self.attrs.get(name) {
            Some(AttrValue::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// The categorical value (or bucket label) records are partitioned by.
///
/// Opaque to the core: only equality, ordering and display matter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Records partitioned by group key, as handed to the pipeline.
pub type GroupedRecords = BTreeMap<GroupKey, Vec<Record>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_access() {
        let mut record = Record::new();
        record
            .set("severity", AttrValue::number(2.0))
            .set("injury_type", AttrValue::text("hamstring"));

        assert_eq!(record.number("severity"), Some(2.0));
        assert_eq!(record.label("injury_type").as_deref(), Some("hamstring"));
        assert_eq!(record.number("injury_type"), None);
        assert_eq!(record.label("severity"), None);
        assert_eq!(record.number("missing"), None);
    }

    #[test]
    fn test_group_key_ordering_and_display() {
        let a = GroupKey::new("18-24");
        let b = GroupKey::new("25-29");
        assert!(a < b);
        assert_eq!(a.to_string(), "18-24");
        assert_eq!(GroupKey::from("25-29"), b);
    }
}
