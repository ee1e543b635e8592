// shotbase-core/src/document.rs

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, ShotbaseError};

/// A document is an ordered field map. `serde_json` is built with
/// `preserve_order`, so insertion order survives save/load round-trips.
pub type Document = Map<String, Value>;

pub const FIELD_ID: &str = "_id";
pub const FIELD_CREATED_AT: &str = "_created_at";
pub const FIELD_UPDATED_AT: &str = "_updated_at";

/// True for the engine-managed fields callers may not target in updates.
pub(crate) fn is_reserved_field(path: &str) -> bool {
    matches!(path, FIELD_ID | FIELD_CREATED_AT | FIELD_UPDATED_AT)
}

/// Fresh unique document id (hyphenated UUID v4).
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC time, ISO-8601 with microsecond precision.
pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Returns the document's `_id` when present and a string.
pub(crate) fn doc_id(doc: &Document) -> Option<&str> {
    doc.get(FIELD_ID).and_then(Value::as_str)
}

/// Prepares caller fields for insertion: validates any supplied `_id`,
/// generates one otherwise, and stamps both timestamps. The result carries
/// the reserved fields in canonical positions (`_id` first, timestamps
/// last), with caller fields in their original order between them.
pub(crate) fn stamp_new(fields: Document) -> Result<(String, Document)> {
    let id = match fields.get(FIELD_ID) {
        None => new_document_id(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(other) => {
            return Err(ShotbaseError::validation(format!(
                "_id must be a non-empty string, got {}",
                type_name(other)
            )))
        }
    };

    let now = timestamp_now();
    let mut doc = Document::new();
    doc.insert(FIELD_ID.to_string(), Value::String(id.clone()));
    for (key, value) in fields {
        if !is_reserved_field(&key) {
            doc.insert(key, value);
        }
    }
    doc.insert(FIELD_CREATED_AT.to_string(), Value::String(now.clone()));
    doc.insert(FIELD_UPDATED_AT.to_string(), Value::String(now));
    Ok((id, doc))
}

/// Refreshes `_updated_at`. Called after every successful mutation.
pub(crate) fn touch(doc: &mut Document) {
    doc.insert(
        FIELD_UPDATED_AT.to_string(),
        Value::String(timestamp_now()),
    );
}

/// Short JSON type name for error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
