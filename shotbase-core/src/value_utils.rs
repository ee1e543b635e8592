//! Shared helpers for JSON value trees.
//!
//! Dot-path access and type-aware comparison live here so the query
//! evaluator, update engine, sort logic and aggregation stages all agree
//! on one set of semantics.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Resolves a dot-separated path against a value tree.
///
/// Object segments are looked up by key; a numeric segment indexes into an
/// array. Any missing or mistyped step yields `None`, never an error.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Writes `value` at a dot-separated path, creating intermediate objects as
/// needed. A non-object value sitting in the way is replaced by a fresh
/// mapping, so the write always lands.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    let (parents, last) = split_last_segment(path);
    let mut current = root;
    if !parents.is_empty() {
        for segment in parents.split('.') {
            if !matches!(current, Value::Object(_)) {
                *current = Value::Object(Map::new());
            }
            if let Value::Object(map) = current {
                current = map
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
        }
    }
    if !matches!(current, Value::Object(_)) {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), value);
    }
}

/// Removes the value at a dot-separated path, returning it when present.
/// Sibling field order is preserved (`shift_remove`).
pub fn remove_path(root: &mut Value, path: &str) -> Option<Value> {
    let (parents, last) = split_last_segment(path);
    let mut current = root;
    if !parents.is_empty() {
        for segment in parents.split('.') {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                _ => return None,
            };
        }
    }
    match current {
        Value::Object(map) => map.shift_remove(last),
        _ => None,
    }
}

fn split_last_segment(path: &str) -> (&str, &str) {
    match path.rsplit_once('.') {
        Some((parents, last)) => (parents, last),
        None => ("", path),
    }
}

// Documents are stored as bare field maps rather than `Value::Object`
// wrappers, so the path helpers get map-rooted twins that avoid cloning a
// document just to traverse it.

/// `get_path` rooted at a field map.
pub fn doc_path<'a>(doc: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        None => doc.get(path),
        Some((head, rest)) => get_path(doc.get(head)?, rest),
    }
}

/// `set_path` rooted at a field map.
pub fn doc_set_path(doc: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_path(entry, rest, value);
        }
    }
}

/// `remove_path` rooted at a field map.
pub fn doc_remove_path(doc: &mut Map<String, Value>, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => doc.shift_remove(path),
        Some((head, rest)) => remove_path(doc.get_mut(head)?, rest),
    }
}

/// Type-aware ordering between two values of the same class.
///
/// Numbers compare numerically (integer pairs compare exactly), strings
/// lexicographically, booleans false-before-true. Any cross-type pair is
/// `None`: comparison operators treat that as "never matches".
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(xi), Some(yi)) => Some(xi.cmp(&yi)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total ordering used by sort stages and `find_with_options`.
///
/// Missing fields sort before present ones; mixed types fall back to a
/// fixed type ladder; values the ladder cannot separate compare equal, and
/// stable sorting keeps their input order.
pub fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => type_priority(x)
            .cmp(&type_priority(y))
            .then_with(|| compare_values(x, y).unwrap_or(Ordering::Equal)),
    }
}

fn type_priority(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
    }
}
