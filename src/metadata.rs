//! Pass-through metadata attached to operations
//!
//! Values are restricted to scalars so the snapshot schema stays stable.
//! The engine stores and exports metadata but never interprets it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Metadata attached to an operation at start time
pub type Metadata = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    /// Convert an arbitrary JSON value, flattening non-scalars to their JSON text
    ///
    /// Returns the value and whether flattening was needed. `null` becomes an
    /// empty string.
    pub fn from_json_lossy(value: serde_json::Value) -> (Self, bool) {
        match value {
            serde_json::Value::Bool(b) => (MetadataValue::Bool(b), false),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => (MetadataValue::Integer(i), false),
                None => (MetadataValue::Float(n.as_f64().unwrap_or(0.0)), false),
            },
            serde_json::Value::String(s) => (MetadataValue::Text(s), false),
            serde_json::Value::Null => (MetadataValue::Text(String::new()), true),
            other => (MetadataValue::Text(other.to_string()), true),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Integer(i64::from(value))
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        MetadataValue::Integer(i64::from(value))
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        match i64::try_from(value) {
            Ok(i) => MetadataValue::Integer(i),
            Err(_) => MetadataValue::Float(value as f64),
        }
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

/// Build a [`Metadata`] map from key/value pairs
///
/// ```
/// use pipetime::metadata::{metadata, MetadataValue};
///
/// let meta = metadata([("batch", MetadataValue::from(3)), ("model", "gpt".into())]);
/// assert_eq!(meta.len(), 2);
/// ```
pub fn metadata<K, I>(pairs: I) -> Metadata
where
    K: Into<String>,
    I: IntoIterator<Item = (K, MetadataValue)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
