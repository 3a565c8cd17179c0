//! Typed attribute values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A row value: attribute name to attribute.
pub type Item = BTreeMap<String, AttributeValue>;

/// A typed attribute, the storage-side form of a JSON tree.
///
/// Every JSON value maps onto exactly one variant and back. Numbers keep
/// their JSON representation; when written to a journal they travel as
/// decimal text so no precision is lost in the frame format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(#[serde(with = "number_text")] serde_json::Number),
    /// Text value.
    String(String),
    /// Ordered list of attributes.
    List(Vec<AttributeValue>),
    /// Nested attribute map.
    Map(Item),
}

impl AttributeValue {
    /// Short type tag, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Null => "NULL",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Number(_) => "N",
            AttributeValue::String(_) => "S",
            AttributeValue::List(_) => "L",
            AttributeValue::Map(_) => "M",
        }
    }

    /// Returns the text if this is a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as `i64` if this is an integral number attribute.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the nested map if this is a map attribute.
    pub fn as_map(&self) -> Option<&Item> {
        match self {
            AttributeValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value.into())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

mod number_text {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(n: &serde_json::Number, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&n.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<serde_json::Number, D::Error> {
        let text = String::deserialize(d)?;
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(serde_json::Value::Number(n)) => Ok(n),
            _ => Err(D::Error::custom(format!("invalid number text {text:?}"))),
        }
    }
}
