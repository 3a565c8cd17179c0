//! Schema-agnostic log records.
//!
//! The server stores whatever object a client sends, keyed by its
//! `version`. It never looks at `type`; typed decoding happens when a
//! client materializes the log.

use crate::entity::VersionedEntity;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of a user's log, as seen by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Position in the log.
    pub version: Version,
    /// Every other field of the object.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    /// Creates a record from its parts. A `version` key in `fields` is dropped.
    pub fn new(version: impl Into<Version>, mut fields: Map<String, Value>) -> Self {
        fields.remove("version");
        Self {
            version: version.into(),
            fields,
        }
    }

    /// Validates the `index`-th element of an uploaded batch.
    ///
    /// The element must be an object whose `version` is an integer in
    /// `0..=Version::MAX`.
    pub fn from_json(index: usize, value: Value) -> ProtocolResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::NotAnObject { index });
        };
        let raw = fields
            .remove("version")
            .ok_or(ProtocolError::MissingVersion { index })?;
        let version = raw
            .as_i64()
            .filter(|v| (0..=Version::MAX.get()).contains(v))
            .ok_or_else(|| ProtocolError::InvalidVersion {
                index,
                value: raw.to_string(),
            })?;
        Ok(Self {
            version: Version(version),
            fields,
        })
    }

    /// Validates a whole uploaded batch.
    pub fn batch_from_json(value: Value) -> ProtocolResult<Vec<Self>> {
        let Value::Array(items) = value else {
            return Err(ProtocolError::json("expected an array of records"));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| Self::from_json(index, item))
            .collect()
    }

    /// Reassembles the full JSON object.
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("version".into(), Value::from(self.version.get()));
        Value::Object(object)
    }

    /// Converts a typed entity into a record.
    pub fn from_entity(entity: &VersionedEntity) -> ProtocolResult<Self> {
        let value = serde_json::to_value(entity)?;
        Self::from_json(0, value)
    }

    /// Decodes the record as a typed entity.
    pub fn into_entity(self) -> ProtocolResult<VersionedEntity> {
        let mut object = self.fields;
        object.insert("version".into(), Value::from(self.version.get()));
        Ok(serde_json::from_value(Value::Object(object))?)
    }
}
