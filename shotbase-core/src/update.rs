// shotbase-core/src/update.rs
//! Update engine.
//!
//! Every entry point computes the next document state on a private clone
//! and hands it back only when the whole spec applied cleanly, so a
//! validation failure mid-spec leaves the stored document untouched.

use serde_json::{Map, Number, Value};

use crate::document::{is_reserved_field, touch, type_name, Document, FIELD_CREATED_AT, FIELD_ID};
use crate::error::{Result, ShotbaseError};
use crate::query::value_matches_condition;
use crate::value_utils::{doc_path, doc_remove_path, doc_set_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOp {
    Set,
    Inc,
    Push,
    Pull,
    Unset,
}

impl UpdateOp {
    fn from_key(key: &str) -> Result<UpdateOp> {
        match key {
            "$set" => Ok(UpdateOp::Set),
            "$inc" => Ok(UpdateOp::Inc),
            "$push" => Ok(UpdateOp::Push),
            "$pull" => Ok(UpdateOp::Pull),
            "$unset" => Ok(UpdateOp::Unset),
            other => Err(ShotbaseError::validation(format!(
                "unknown update operator: {}",
                other
            ))),
        }
    }
}

/// How an update spec is to be interpreted.
pub(crate) enum UpdateMode<'a> {
    /// All keys are `$` operators.
    Operators(&'a Map<String, Value>),
    /// No `$` keys: the update is a bare document, meaning full replace.
    Replace(&'a Map<String, Value>),
}

pub(crate) fn classify_update(update: &Value) -> Result<UpdateMode<'_>> {
    let map = match update {
        Value::Object(map) => map,
        other => {
            return Err(ShotbaseError::validation(format!(
                "update must be an object, got {}",
                type_name(other)
            )))
        }
    };
    let operator_keys = map.keys().filter(|k| k.starts_with('$')).count();
    if operator_keys == 0 {
        Ok(UpdateMode::Replace(map))
    } else if operator_keys == map.len() {
        Ok(UpdateMode::Operators(map))
    } else {
        Err(ShotbaseError::validation(
            "update cannot mix operators and plain fields",
        ))
    }
}

/// Applies an update spec to a document, returning the new state with
/// `_updated_at` refreshed. The original is never modified.
pub(crate) fn apply_update(original: &Document, update: &Value) -> Result<Document> {
    match classify_update(update)? {
        UpdateMode::Replace(replacement) => Ok(apply_replace(original, replacement)),
        UpdateMode::Operators(operators) => {
            let mut next = original.clone();
            for (key, fields) in operators {
                let op = UpdateOp::from_key(key)?;
                let fields = match fields {
                    Value::Object(map) => map,
                    other => {
                        return Err(ShotbaseError::validation(format!(
                            "{} requires an object of field/value pairs, got {}",
                            key,
                            type_name(other)
                        )))
                    }
                };
                for (path, operand) in fields {
                    if is_reserved_field(path) {
                        return Err(ShotbaseError::validation(format!(
                            "{} cannot target reserved field '{}'",
                            key, path
                        )));
                    }
                    apply_operator(&mut next, op, path, operand)?;
                }
            }
            touch(&mut next);
            Ok(next)
        }
    }
}

/// Full replace: every caller field is dropped in favor of the replacement,
/// while `_id` and `_created_at` survive and `_updated_at` is refreshed.
pub(crate) fn apply_replace(original: &Document, replacement: &Document) -> Document {
    let mut next = Document::new();
    if let Some(id) = original.get(FIELD_ID) {
        next.insert(FIELD_ID.to_string(), id.clone());
    }
    for (key, value) in replacement {
        if !is_reserved_field(key) {
            next.insert(key.clone(), value.clone());
        }
    }
    if let Some(created) = original.get(FIELD_CREATED_AT) {
        next.insert(FIELD_CREATED_AT.to_string(), created.clone());
    }
    touch(&mut next);
    next
}

fn apply_operator(next: &mut Document, op: UpdateOp, path: &str, operand: &Value) -> Result<()> {
    match op {
        UpdateOp::Set => {
            doc_set_path(next, path, operand.clone());
        }
        UpdateOp::Inc => {
            let delta = match operand {
                Value::Number(n) => n,
                other => {
                    return Err(ShotbaseError::validation(format!(
                        "$inc delta for '{}' must be numeric, got {}",
                        path,
                        type_name(other)
                    )))
                }
            };
            let updated = match doc_path(next, path).cloned() {
                None => Value::Number(delta.clone()),
                Some(Value::Number(existing)) => add_numbers(&existing, delta)?,
                Some(other) => {
                    return Err(ShotbaseError::validation(format!(
                        "$inc target '{}' holds non-numeric {}",
                        path,
                        type_name(&other)
                    )))
                }
            };
            doc_set_path(next, path, updated);
        }
        UpdateOp::Push => match doc_path(next, path).cloned() {
            None => doc_set_path(next, path, Value::Array(vec![operand.clone()])),
            Some(Value::Array(mut items)) => {
                items.push(operand.clone());
                doc_set_path(next, path, Value::Array(items));
            }
            Some(other) => {
                return Err(ShotbaseError::validation(format!(
                    "$push target '{}' is not an array, got {}",
                    path,
                    type_name(&other)
                )))
            }
        },
        UpdateOp::Pull => {
            // absent field or non-array target is a no-op for this path
            if let Some(Value::Array(items)) = doc_path(next, path).cloned() {
                let mut kept = Vec::with_capacity(items.len());
                for item in items {
                    if !value_matches_condition(&item, operand)? {
                        kept.push(item);
                    }
                }
                doc_set_path(next, path, Value::Array(kept));
            }
        }
        UpdateOp::Unset => {
            doc_remove_path(next, path);
        }
    }
    Ok(())
}

/// Integer pairs stay integers; anything involving a float becomes a float.
fn add_numbers(a: &Number, b: &Number) -> Result<Value> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Value::Number(Number::from(sum)));
        }
    }
    let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
    Number::from_f64(sum)
        .map(Value::Number)
        .ok_or_else(|| ShotbaseError::validation("non-finite $inc result"))
}

/// Builds the upsert seed: the filter's top-level equality fields, with
/// dot-paths expanded into nested mappings. Operator conditions and `$or`
/// carry no concrete value and are skipped.
pub(crate) fn seed_from_filter(filter: &Value) -> Result<Document> {
    let conditions = match filter {
        Value::Object(map) => map,
        other => {
            return Err(ShotbaseError::validation(format!(
                "filter must be an object, got {}",
                type_name(other)
            )))
        }
    };
    let mut seed = Document::new();
    for (key, condition) in conditions {
        if key.starts_with('$') {
            continue;
        }
        match condition {
            Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => continue,
            literal => doc_set_path(&mut seed, key, literal.clone()),
        }
    }
    Ok(seed)
}
