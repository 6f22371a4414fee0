//! Labeled, weighted, timestamped training instances

pub mod timestamp;

pub use timestamp::{
    ComposedFieldExtractor, DateTimeExtractor, ParsedFieldExtractor, StoredTimestampExtractor,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Numeric(f64),
    Categorical(String),
    Boolean(bool),
}

impl AttributeValue {
    /// Numeric view of the value. Booleans map to 0/1, categoricals have none.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            AttributeValue::Numeric(v) => Some(*v),
            AttributeValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttributeValue::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            AttributeValue::Categorical(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Numeric(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Numeric(v as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Categorical(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Categorical(v)
    }
}

/// Attribute map of an instance. Ordered so that derived feature layouts
/// and serialized forms are deterministic.
pub type AttributesMap = BTreeMap<String, AttributeValue>;

/// Ground-truth outcome of an instance.
///
/// The label kind is a closed set chosen when the data is loaded; nothing
/// downstream inspects attribute contents to guess it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Label {
    Boolean(bool),
    Categorical(String),
    Numeric(f64),
}

impl Label {
    /// Numeric view for regression-style consumers. Booleans map to 0/1.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Label::Numeric(v) => Some(*v),
            Label::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Label::Categorical(_) => None,
        }
    }

    /// Binary indicator relative to a designated positive label.
    pub fn binary_indicator(&self, positive: &Label) -> f64 {
        if self == positive {
            1.0
        } else {
            0.0
        }
    }
}

/// A single labeled, weighted, timestamped training example.
///
/// Instances are loaded once and treated as immutable for the life of an
/// optimization run; the timestamp, once stored, never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    attributes: AttributesMap,
    label: Label,
    weight: f64,
    timestamp: Option<DateTime<Utc>>,
}

impl Instance {
    /// Create an instance with weight 1.0 and no stored timestamp.
    pub fn new(attributes: AttributesMap, label: Label) -> Self {
        Self {
            attributes,
            label,
            weight: 1.0,
            timestamp: None,
        }
    }

    /// Set the instance weight. Negative weights are clamped to zero.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.max(0.0);
        self
    }

    /// Store an explicit timestamp on the instance.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn attributes(&self) -> &AttributesMap {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> AttributesMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_default_weight() {
        let inst = Instance::new(attrs(&[("x", 1.5.into())]), Label::Boolean(true));
        assert_eq!(inst.weight(), 1.0);
        assert!(inst.timestamp().is_none());
    }

    #[test]
    fn test_negative_weight_clamped() {
        let inst =
            Instance::new(AttributesMap::new(), Label::Boolean(false)).with_weight(-3.0);
        assert_eq!(inst.weight(), 0.0);
    }

    #[test]
    fn test_stored_timestamp_is_stable() {
        let ts = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        let inst = Instance::new(AttributesMap::new(), Label::Boolean(true)).with_timestamp(ts);
        assert_eq!(inst.timestamp(), Some(ts));
        assert_eq!(inst.timestamp(), Some(ts));
    }

    #[test]
    fn test_binary_indicator() {
        assert_eq!(
            Label::Categorical("click".into()).binary_indicator(&Label::Categorical("click".into())),
            1.0
        );
        assert_eq!(
            Label::Categorical("skip".into()).binary_indicator(&Label::Categorical("click".into())),
            0.0
        );
        assert_eq!(Label::Boolean(true).binary_indicator(&Label::Boolean(true)), 1.0);
    }

    #[test]
    fn test_attribute_numeric_views() {
        assert_eq!(AttributeValue::Boolean(true).as_numeric(), Some(1.0));
        assert_eq!(AttributeValue::Numeric(2.5).as_numeric(), Some(2.5));
        assert_eq!(AttributeValue::Categorical("a".into()).as_numeric(), None);
    }
}
