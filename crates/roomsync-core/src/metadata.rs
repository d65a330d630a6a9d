//! Thread metadata values and patches

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(Number),
    String(String),
}

/// Number type supporting both integers and floats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl MetadataValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Number(Number::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(Number::Float(n)) => Some(*n),
            MetadataValue::Number(Number::Integer(n)) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Number(Number::Integer(v))
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Number(Number::Float(v))
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_string())
    }
}

impl TryFrom<&serde_json::Value> for MetadataValue {
    type Error = String;

    fn try_from(value: &serde_json::Value) -> std::result::Result<Self, Self::Error> {
        match value {
            serde_json::Value::Bool(b) => Ok(MetadataValue::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(MetadataValue::Number(Number::Integer(i))),
                None => n
                    .as_f64()
                    .map(|f| MetadataValue::Number(Number::Float(f)))
                    .ok_or_else(|| format!("number {} is out of range", n)),
            },
            serde_json::Value::String(s) => Ok(MetadataValue::String(s.clone())),
            serde_json::Value::Null => Err("null is only allowed in patches".into()),
            serde_json::Value::Array(_) => Err("arrays are not allowed".into()),
            serde_json::Value::Object(_) => Err("nested objects are not allowed".into()),
        }
    }
}

/// Metadata attached to a thread
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Partial metadata update. A `None` value removes the key.
pub type MetadataPatch = BTreeMap<String, Option<MetadataValue>>;

/// Build metadata from a JSON object, rejecting nested or null values.
pub fn metadata_from_json(value: &serde_json::Value) -> Result<Metadata> {
    let object = value.as_object().ok_or_else(|| Error::InvalidMetadata {
        key: String::new(),
        reason: "metadata must be a JSON object".into(),
    })?;

    object
        .iter()
        .map(|(key, v)| {
            MetadataValue::try_from(v)
                .map(|v| (key.clone(), v))
                .map_err(|reason| Error::InvalidMetadata {
                    key: key.clone(),
                    reason,
                })
        })
        .collect()
}

/// Shallow-merge `patch` into `metadata`.
pub fn apply_patch(metadata: &mut Metadata, patch: &MetadataPatch) {
    for (key, value) in patch {
        match value {
            Some(v) => {
                metadata.insert(key.clone(), v.clone());
            }
            None => {
                metadata.remove(key);
            }
        }
    }
}

/// True when every key in `query` is present in `metadata` with an equal value.
pub fn matches(metadata: &Metadata, query: &Metadata) -> bool {
    query
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}
