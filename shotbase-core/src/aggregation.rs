// shotbase-core/src/aggregation.rs
//! Aggregation pipeline.
//!
//! A pipeline is an ordered list of stage objects; each stage consumes the
//! previous stage's output. The whole pipeline is parsed and validated
//! before the first stage runs, so a typo in stage three fails fast instead
//! of after two stages of work.

use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::document::{type_name, Document};
use crate::error::{Result, ShotbaseError};
use crate::find_options::{project_documents, sort_documents};
use crate::query::matches_filter;
use crate::value_utils::{compare_values, doc_path};

/// Runs `pipeline` over `docs`, producing an independent result sequence.
pub(crate) fn run_pipeline(docs: Vec<Document>, pipeline: &Value) -> Result<Vec<Document>> {
    let stages = parse_pipeline(pipeline)?;
    let mut current = docs;
    for stage in &stages {
        current = stage.execute(current)?;
    }
    Ok(current)
}

#[derive(Debug, Clone)]
enum Stage {
    Match(Value),
    Group {
        key: GroupKey,
        accumulators: Vec<(String, Accumulator)>,
    },
    Sort(Vec<(String, i32)>),
    Project(Vec<(String, i32)>),
    Limit(usize),
    Skip(usize),
}

#[derive(Debug, Clone)]
enum GroupKey {
    /// `_id: null` folds the whole input into one group.
    Null,
    /// `_id: "$path"` groups by the value at that dot-path.
    Field(String),
}

#[derive(Debug, Clone)]
enum Accumulator {
    Sum(SumInput),
    Avg(String),
    Min(String),
    Max(String),
    Count,
    Push(String),
    First(String),
    Last(String),
}

#[derive(Debug, Clone)]
enum SumInput {
    /// `{$sum: 1}` style literal, added once per document.
    Constant(Number),
    Field(String),
}

// ========== PARSING ==========

fn parse_pipeline(pipeline: &Value) -> Result<Vec<Stage>> {
    let stages = match pipeline {
        Value::Array(items) => items,
        other => {
            return Err(ShotbaseError::validation(format!(
                "pipeline must be an array of stages, got {}",
                type_name(other)
            )))
        }
    };
    stages.iter().map(parse_stage).collect()
}

fn parse_stage(stage: &Value) -> Result<Stage> {
    let map = match stage {
        Value::Object(map) => map,
        other => {
            return Err(ShotbaseError::validation(format!(
                "each pipeline stage must be an object, got {}",
                type_name(other)
            )))
        }
    };
    let (name, body) = match map.iter().next() {
        Some(entry) if map.len() == 1 => entry,
        _ => {
            return Err(ShotbaseError::validation(
                "each pipeline stage must hold exactly one operator",
            ))
        }
    };
    match name.as_str() {
        "$match" => match body {
            Value::Object(_) => Ok(Stage::Match(body.clone())),
            other => Err(ShotbaseError::validation(format!(
                "$match requires a filter object, got {}",
                type_name(other)
            ))),
        },
        "$group" => parse_group(body),
        "$sort" => Ok(Stage::Sort(parse_direction_map(body, "$sort")?)),
        "$project" => Ok(Stage::Project(parse_direction_map(body, "$project")?)),
        "$limit" => Ok(Stage::Limit(parse_bound(body, "$limit")?)),
        "$skip" => Ok(Stage::Skip(parse_bound(body, "$skip")?)),
        other => Err(ShotbaseError::validation(format!(
            "unknown pipeline stage: {}",
            other
        ))),
    }
}

fn parse_group(body: &Value) -> Result<Stage> {
    let map = match body {
        Value::Object(map) => map,
        other => {
            return Err(ShotbaseError::validation(format!(
                "$group requires an object, got {}",
                type_name(other)
            )))
        }
    };
    let key = match map.get("_id") {
        None => {
            return Err(ShotbaseError::validation(
                "$group requires an _id expression",
            ))
        }
        Some(Value::Null) => GroupKey::Null,
        Some(Value::String(reference)) => GroupKey::Field(parse_field_ref(reference)?),
        Some(other) => {
            return Err(ShotbaseError::validation(format!(
                "$group _id must be null or a '$field' reference, got {}",
                type_name(other)
            )))
        }
    };
    let mut accumulators = Vec::new();
    for (output, spec) in map {
        if output == "_id" {
            continue;
        }
        accumulators.push((output.clone(), parse_accumulator(output, spec)?));
    }
    Ok(Stage::Group { key, accumulators })
}

fn parse_accumulator(output: &str, spec: &Value) -> Result<Accumulator> {
    let map = match spec {
        Value::Object(map) => map,
        other => {
            return Err(ShotbaseError::validation(format!(
                "accumulator for '{}' must be an operator object, got {}",
                output,
                type_name(other)
            )))
        }
    };
    let (operator, operand) = match map.iter().next() {
        Some(entry) if map.len() == 1 => entry,
        _ => {
            return Err(ShotbaseError::validation(format!(
                "accumulator for '{}' must hold exactly one operator",
                output
            )))
        }
    };
    match operator.as_str() {
        "$sum" => match operand {
            Value::Number(n) => Ok(Accumulator::Sum(SumInput::Constant(n.clone()))),
            Value::String(reference) => {
                Ok(Accumulator::Sum(SumInput::Field(parse_field_ref(reference)?)))
            }
            other => Err(ShotbaseError::validation(format!(
                "$sum takes a number or a '$field' reference, got {}",
                type_name(other)
            ))),
        },
        "$avg" => Ok(Accumulator::Avg(parse_ref_operand(operand, "$avg")?)),
        "$min" => Ok(Accumulator::Min(parse_ref_operand(operand, "$min")?)),
        "$max" => Ok(Accumulator::Max(parse_ref_operand(operand, "$max")?)),
        "$push" => Ok(Accumulator::Push(parse_ref_operand(operand, "$push")?)),
        "$first" => Ok(Accumulator::First(parse_ref_operand(operand, "$first")?)),
        "$last" => Ok(Accumulator::Last(parse_ref_operand(operand, "$last")?)),
        "$count" => match operand {
            Value::Object(m) if m.is_empty() => Ok(Accumulator::Count),
            Value::Null => Ok(Accumulator::Count),
            other => Err(ShotbaseError::validation(format!(
                "$count takes an empty object, got {}",
                type_name(other)
            ))),
        },
        other => Err(ShotbaseError::validation(format!(
            "unknown accumulator: {}",
            other
        ))),
    }
}

fn parse_ref_operand(operand: &Value, operator: &str) -> Result<String> {
    match operand {
        Value::String(reference) => parse_field_ref(reference),
        other => Err(ShotbaseError::validation(format!(
            "{} requires a '$field' reference, got {}",
            operator,
            type_name(other)
        ))),
    }
}

fn parse_field_ref(reference: &str) -> Result<String> {
    match reference.strip_prefix('$') {
        Some(path) if !path.is_empty() => Ok(path.to_string()),
        _ => Err(ShotbaseError::validation(format!(
            "expected a '$field' reference, got '{}'",
            reference
        ))),
    }
}

fn parse_direction_map(body: &Value, stage: &str) -> Result<Vec<(String, i32)>> {
    let map = match body {
        Value::Object(map) => map,
        other => {
            return Err(ShotbaseError::validation(format!(
                "{} requires an object, got {}",
                stage,
                type_name(other)
            )))
        }
    };
    let mut entries = Vec::with_capacity(map.len());
    for (path, direction) in map {
        let direction = direction.as_i64().ok_or_else(|| {
            ShotbaseError::validation(format!(
                "{} value for '{}' must be an integer",
                stage, path
            ))
        })?;
        entries.push((path.clone(), direction as i32));
    }
    Ok(entries)
}

fn parse_bound(body: &Value, stage: &str) -> Result<usize> {
    match body.as_u64() {
        Some(n) => Ok(n as usize),
        None => Err(ShotbaseError::validation(format!(
            "{} requires a non-negative integer, got {}",
            stage, body
        ))),
    }
}

// ========== EXECUTION ==========

impl Stage {
    fn execute(&self, docs: Vec<Document>) -> Result<Vec<Document>> {
        match self {
            Stage::Match(filter) => {
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches_filter(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                Ok(kept)
            }
            Stage::Group { key, accumulators } => execute_group(docs, key, accumulators),
            Stage::Sort(keys) => {
                let mut docs = docs;
                sort_documents(&mut docs, keys)?;
                Ok(docs)
            }
            Stage::Project(projection) => project_documents(docs, projection),
            Stage::Limit(n) => Ok(docs.into_iter().take(*n).collect()),
            Stage::Skip(n) => Ok(docs.into_iter().skip(*n).collect()),
        }
    }
}

/// Groups documents by the key expression and folds each accumulator over
/// its group. Groups emit in first-seen input order.
fn execute_group(
    docs: Vec<Document>,
    key: &GroupKey,
    accumulators: &[(String, Accumulator)],
) -> Result<Vec<Document>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (Value, Vec<Document>)> = HashMap::new();
    for doc in docs {
        let key_value = match key {
            GroupKey::Null => Value::Null,
            GroupKey::Field(path) => doc_path(&doc, path).cloned().unwrap_or(Value::Null),
        };
        // compact JSON rendering doubles as a hashable group key
        let canonical = key_value.to_string();
        let members = groups.entry(canonical.clone()).or_insert_with(|| {
            order.push(canonical);
            (key_value, Vec::new())
        });
        members.1.push(doc);
    }

    let mut results = Vec::with_capacity(order.len());
    for canonical in &order {
        if let Some((key_value, members)) = groups.remove(canonical) {
            let mut result = Document::new();
            result.insert("_id".to_string(), key_value);
            for (output, accumulator) in accumulators {
                result.insert(output.clone(), accumulator.compute(&members));
            }
            results.push(result);
        }
    }
    Ok(results)
}

impl Accumulator {
    /// Folds one group. Numeric accumulators silently skip values that are
    /// missing or non-numeric; `$avg` of nothing is null.
    fn compute(&self, docs: &[Document]) -> Value {
        match self {
            Accumulator::Sum(SumInput::Constant(n)) => sum_constant(n, docs.len()),
            Accumulator::Sum(SumInput::Field(path)) => sum_numbers(&numeric_values(docs, path)),
            Accumulator::Avg(path) => {
                let numbers = numeric_values(docs, path);
                if numbers.is_empty() {
                    return Value::Null;
                }
                let total: f64 = numbers.iter().map(|n| n.as_f64().unwrap_or(0.0)).sum();
                Number::from_f64(total / numbers.len() as f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
            Accumulator::Min(path) => extremum(docs, path, std::cmp::Ordering::Less),
            Accumulator::Max(path) => extremum(docs, path, std::cmp::Ordering::Greater),
            Accumulator::Count => Value::Number(Number::from(docs.len() as u64)),
            Accumulator::Push(path) => Value::Array(
                docs.iter()
                    .filter_map(|doc| doc_path(doc, path).cloned())
                    .collect(),
            ),
            Accumulator::First(path) => docs
                .first()
                .and_then(|doc| doc_path(doc, path).cloned())
                .unwrap_or(Value::Null),
            Accumulator::Last(path) => docs
                .last()
                .and_then(|doc| doc_path(doc, path).cloned())
                .unwrap_or(Value::Null),
        }
    }
}

fn numeric_values<'a>(docs: &'a [Document], path: &str) -> Vec<&'a Number> {
    docs.iter()
        .filter_map(|doc| match doc_path(doc, path) {
            Some(Value::Number(n)) => Some(n),
            _ => None,
        })
        .collect()
}

/// Integer sums stay integers until a float or an overflow shows up.
fn sum_numbers(numbers: &[&Number]) -> Value {
    let mut int_sum: Option<i64> = Some(0);
    let mut float_sum = 0.0;
    for n in numbers {
        int_sum = match (int_sum, n.as_i64()) {
            (Some(acc), Some(i)) => acc.checked_add(i),
            _ => None,
        };
        float_sum += n.as_f64().unwrap_or(0.0);
    }
    match int_sum {
        Some(total) => Value::Number(Number::from(total)),
        None => Number::from_f64(float_sum)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

fn sum_constant(n: &Number, count: usize) -> Value {
    if let Some(i) = n.as_i64() {
        if let Some(product) = i.checked_mul(count as i64) {
            return Value::Number(Number::from(product));
        }
    }
    Number::from_f64(n.as_f64().unwrap_or(0.0) * count as f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn extremum(docs: &[Document], path: &str, keep: std::cmp::Ordering) -> Value {
    let mut best: Option<&Number> = None;
    for n in numeric_values(docs, path) {
        best = match best {
            None => Some(n),
            Some(current) => {
                let candidate = Value::Number(n.clone());
                let reference = Value::Number(current.clone());
                if compare_values(&candidate, &reference) == Some(keep) {
                    Some(n)
                } else {
                    Some(current)
                }
            }
        };
    }
    best.map(|n| Value::Number(n.clone())).unwrap_or(Value::Null)
}
