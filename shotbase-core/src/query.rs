// shotbase-core/src/query.rs
//! Filter evaluation.
//!
//! A filter is a JSON object: plain keys are dot-paths carrying either a
//! literal (equality) or an operator mapping, `$or` holds alternative
//! sub-filters, and everything at the top level is AND-ed. The operator set
//! is closed; anything unknown is a validation error, never a silent skip.

use std::cmp::Ordering;
use std::num::NonZeroUsize;

use lazy_static::lazy_static;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Map, Value};

use crate::document::{type_name, Document};
use crate::error::{Result, ShotbaseError};
use crate::value_utils::{compare_values, doc_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
    Regex,
}

impl QueryOp {
    fn from_key(key: &str) -> Result<QueryOp> {
        match key {
            "$eq" => Ok(QueryOp::Eq),
            "$ne" => Ok(QueryOp::Ne),
            "$gt" => Ok(QueryOp::Gt),
            "$gte" => Ok(QueryOp::Gte),
            "$lt" => Ok(QueryOp::Lt),
            "$lte" => Ok(QueryOp::Lte),
            "$in" => Ok(QueryOp::In),
            "$nin" => Ok(QueryOp::Nin),
            "$exists" => Ok(QueryOp::Exists),
            "$regex" => Ok(QueryOp::Regex),
            other => Err(ShotbaseError::validation(format!(
                "unknown query operator: {}",
                other
            ))),
        }
    }
}

/// Decides whether a document matches a filter. An empty filter matches
/// every document.
pub fn matches_filter(doc: &Document, filter: &Value) -> Result<bool> {
    let conditions = match filter {
        Value::Object(map) => map,
        other => {
            return Err(ShotbaseError::validation(format!(
                "filter must be an object, got {}",
                type_name(other)
            )))
        }
    };
    for (key, condition) in conditions {
        let clause = if key == "$or" {
            matches_or(doc, condition)?
        } else if key.starts_with('$') {
            return Err(ShotbaseError::validation(format!(
                "unknown query operator: {}",
                key
            )));
        } else {
            matches_field(doc_path(doc, key), condition)?
        };
        if !clause {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Matches one value against a literal or operator-mapping condition.
/// Used by `$pull`, where array elements play the role of the field value.
pub(crate) fn value_matches_condition(value: &Value, condition: &Value) -> Result<bool> {
    matches_field(Some(value), condition)
}

fn matches_or(doc: &Document, condition: &Value) -> Result<bool> {
    let alternatives = match condition {
        Value::Array(items) => items,
        other => {
            return Err(ShotbaseError::validation(format!(
                "$or requires an array of filters, got {}",
                type_name(other)
            )))
        }
    };
    for sub_filter in alternatives {
        if matches_filter(doc, sub_filter)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn matches_field(field_value: Option<&Value>, condition: &Value) -> Result<bool> {
    match condition {
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => {
            matches_operator_map(field_value, map)
        }
        literal => Ok(field_value == Some(literal)),
    }
}

fn matches_operator_map(field_value: Option<&Value>, conditions: &Map<String, Value>) -> Result<bool> {
    let options = match conditions.get("$options") {
        None => None,
        Some(Value::String(flags)) => Some(flags.as_str()),
        Some(other) => {
            return Err(ShotbaseError::validation(format!(
                "$options must be a string, got {}",
                type_name(other)
            )))
        }
    };
    if options.is_some() && !conditions.contains_key("$regex") {
        return Err(ShotbaseError::validation("$options requires $regex"));
    }

    for (key, operand) in conditions {
        if key == "$options" {
            continue;
        }
        if !key.starts_with('$') {
            return Err(ShotbaseError::validation(format!(
                "cannot mix plain field '{}' with operators",
                key
            )));
        }
        let matched = match QueryOp::from_key(key)? {
            QueryOp::Eq => field_value == Some(operand),
            QueryOp::Ne => field_value != Some(operand),
            QueryOp::Gt => compare_matches(field_value, operand, |o| o == Ordering::Greater),
            QueryOp::Gte => compare_matches(field_value, operand, |o| o != Ordering::Less),
            QueryOp::Lt => compare_matches(field_value, operand, |o| o == Ordering::Less),
            QueryOp::Lte => compare_matches(field_value, operand, |o| o != Ordering::Greater),
            QueryOp::In => membership(field_value, operand, "$in")?,
            QueryOp::Nin => !membership(field_value, operand, "$nin")?,
            QueryOp::Exists => exists_matches(field_value, operand)?,
            QueryOp::Regex => regex_matches(field_value, operand, options)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Ordering comparisons only ever match when the two values share a type
/// class; a mismatch is "no match", not an error.
fn compare_matches(
    field_value: Option<&Value>,
    operand: &Value,
    predicate: impl Fn(Ordering) -> bool,
) -> bool {
    match field_value {
        Some(value) => compare_values(value, operand)
            .map(predicate)
            .unwrap_or(false),
        None => false,
    }
}

// Missing fields count as "not in the list", so $nin matches them.
fn membership(field_value: Option<&Value>, operand: &Value, op_name: &str) -> Result<bool> {
    let list = match operand {
        Value::Array(items) => items,
        other => {
            return Err(ShotbaseError::validation(format!(
                "{} requires an array, got {}",
                op_name,
                type_name(other)
            )))
        }
    };
    Ok(match field_value {
        Some(value) => list.contains(value),
        None => false,
    })
}

fn exists_matches(field_value: Option<&Value>, operand: &Value) -> Result<bool> {
    match operand {
        Value::Bool(expected) => Ok(field_value.is_some() == *expected),
        other => Err(ShotbaseError::validation(format!(
            "$exists requires a boolean, got {}",
            type_name(other)
        ))),
    }
}

fn regex_matches(field_value: Option<&Value>, operand: &Value, options: Option<&str>) -> Result<bool> {
    let pattern = match operand {
        Value::String(p) => p,
        other => {
            return Err(ShotbaseError::validation(format!(
                "$regex requires a string pattern, got {}",
                type_name(other)
            )))
        }
    };
    let regex = cached_regex(pattern, options)?;
    Ok(match field_value {
        Some(Value::String(s)) => regex.is_match(s),
        _ => false,
    })
}

// ========== REGEX CACHE ==========

// Filters are re-parsed on every call, so compiled patterns are kept in a
// small process-wide LRU keyed by pattern + options.
lazy_static! {
    static ref REGEX_CACHE: Mutex<LruCache<String, Regex>> =
        Mutex::new(LruCache::new(NonZeroUsize::new(64).unwrap()));
}

fn cached_regex(pattern: &str, options: Option<&str>) -> Result<Regex> {
    let key = match options {
        Some(flags) => format!("{}\x1f{}", pattern, flags),
        None => pattern.to_string(),
    };
    if let Some(regex) = REGEX_CACHE.lock().get(&key) {
        return Ok(regex.clone());
    }
    let full_pattern = build_pattern(pattern, options)?;
    let regex = Regex::new(&full_pattern).map_err(|e| {
        ShotbaseError::validation(format!("invalid regex '{}': {}", pattern, e))
    })?;
    REGEX_CACHE.lock().put(key, regex.clone());
    Ok(regex)
}

/// Translates `$options` flags into an inline `(?...)` prefix.
fn build_pattern(pattern: &str, options: Option<&str>) -> Result<String> {
    let flags = match options {
        None | Some("") => return Ok(pattern.to_string()),
        Some(flags) => flags,
    };
    for flag in flags.chars() {
        if !matches!(flag, 'i' | 'm' | 's' | 'x') {
            return Err(ShotbaseError::validation(format!(
                "unsupported $options flag '{}'",
                flag
            )));
        }
    }
    Ok(format!("(?{}){}", flags, pattern))
}
