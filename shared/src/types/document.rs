//! Documents as seen by replication filters
//!
//! The storage layer is reached only through [`DocumentSource`]; the runtime
//! never assumes anything about how a document is stored.

use std::borrow::Cow;

use crate::error::StorageError;
use crate::types::record::{Record, RecordValue};

/// Field name carrying the document identifier inside a filter's `doc` value
pub const ID_FIELD: &str = "_id";

/// Read access to a stored document
pub trait DocumentSource {
    /// Document identifier
    fn id(&self) -> &str;

    /// Read the document body. May fail if the underlying record went away.
    fn read_fields(&self) -> Result<Cow<'_, Record>, StorageError>;
}

/// An in-memory document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Record,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Record) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a document from a JSON object.
    ///
    /// The identifier is taken from a string `_id` field when present,
    /// otherwise `fallback_id` is used.
    pub fn from_json(value: serde_json::Value, fallback_id: &str) -> Result<Self, StorageError> {
        let serde_json::Value::Object(map) = value else {
            return Err(StorageError::NotAnObject {
                found: json_type_name(&value),
            });
        };

        let id = map
            .get(ID_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or(fallback_id)
            .to_string();

        let fields = map
            .into_iter()
            .map(|(k, v)| (k, RecordValue::from(v)))
            .collect();

        Ok(Self { id, fields })
    }
}

impl DocumentSource for Document {
    fn id(&self) -> &str {
        &self.id
    }

    fn read_fields(&self) -> Result<Cow<'_, Record>, StorageError> {
        Ok(Cow::Borrowed(&self.fields))
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
