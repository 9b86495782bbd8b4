//! Record value types
//!
//! A `Record` is the field map of a stored document. Values are an explicit
//! tagged union so that the runtime marshaller can convert them without any
//! runtime type inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field map of a document (or of a nested dictionary inside one)
pub type Record = BTreeMap<String, RecordValue>;

/// Ordered sequence of values inside a document
pub type RecordList = Vec<RecordValue>;

/// Reference to binary content attached to a document.
///
/// The content itself lives in the blob store; filters only ever see the
/// metadata, rendered as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Content digest (e.g. `sha1-...`)
    pub digest: String,

    /// MIME type, if the writer recorded one
    pub content_type: Option<String>,

    /// Length in bytes
    pub length: u64,
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Blob[{}; {} bytes; {}]",
            self.content_type.as_deref().unwrap_or("application/octet-stream"),
            self.length,
            self.digest
        )
    }
}

/// A single document value
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Map(Record),
    List(RecordList),

    /// Timestamp value; scripts see it as an RFC 3339 string.
    Date(DateTime<Utc>),

    /// Attachment reference; scripts see its `Display` form.
    Blob(BlobRef),
}

impl RecordValue {
    /// String form used when a value has no structural counterpart in a script.
    pub fn opaque_repr(&self) -> Option<String> {
        match self {
            RecordValue::Date(d) => Some(d.to_rfc3339()),
            RecordValue::Blob(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<bool> for RecordValue {
    fn from(v: bool) -> Self {
        RecordValue::Bool(v)
    }
}

impl From<i64> for RecordValue {
    fn from(v: i64) -> Self {
        RecordValue::Integer(v)
    }
}

impl From<i32> for RecordValue {
    fn from(v: i32) -> Self {
        RecordValue::Integer(v as i64)
    }
}

impl From<f64> for RecordValue {
    fn from(v: f64) -> Self {
        RecordValue::Float(v)
    }
}

impl From<&str> for RecordValue {
    fn from(v: &str) -> Self {
        RecordValue::String(v.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(v: String) -> Self {
        RecordValue::String(v)
    }
}

impl From<Record> for RecordValue {
    fn from(v: Record) -> Self {
        RecordValue::Map(v)
    }
}

impl From<RecordList> for RecordValue {
    fn from(v: RecordList) -> Self {
        RecordValue::List(v)
    }
}

impl From<serde_json::Value> for RecordValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => RecordValue::Null,
            Value::Bool(b) => RecordValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => RecordValue::Integer(i),
                // u64 beyond i64::MAX and all non-integers
                None => RecordValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => RecordValue::String(s),
            Value::Array(items) => {
                RecordValue::List(items.into_iter().map(RecordValue::from).collect())
            }
            Value::Object(map) => match blob_from_json(&map) {
                Some(blob) => RecordValue::Blob(blob),
                None => RecordValue::Map(
                    map.into_iter()
                        .map(|(k, v)| (k, RecordValue::from(v)))
                        .collect(),
                ),
            },
        }
    }
}

/// Recognize the `{"@type": "blob", "digest": ...}` attachment convention.
fn blob_from_json(map: &serde_json::Map<String, serde_json::Value>) -> Option<BlobRef> {
    if map.get("@type").and_then(|t| t.as_str()) != Some("blob") {
        return None;
    }
    let digest = map.get("digest")?.as_str()?.to_string();
    Some(BlobRef {
        digest,
        content_type: map
            .get("content_type")
            .and_then(|c| c.as_str())
            .map(str::to_string),
        length: map.get("length").and_then(|l| l.as_u64()).unwrap_or(0),
    })
}
