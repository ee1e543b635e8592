// shotbase-core/src/collection.rs
//! Document-level operations over one in-memory collection.
//!
//! The facade and the transaction context both route through these
//! functions, so matching, stamping and update semantics live in exactly
//! one place. Callers own persistence: functions mutate the sequence they
//! are handed and report what changed.

use serde_json::Value;

use crate::document::{doc_id, is_reserved_field, stamp_new, Document};
use crate::error::{Result, ShotbaseError};
use crate::query::matches_filter;
use crate::update::{apply_replace, apply_update, classify_update, seed_from_filter, UpdateMode};
use crate::value_utils::doc_path;

/// Which image an atomic find-and-modify call hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDocument {
    Before,
    After,
}

/// What an upsert did: inserted a fresh document (carrying its new `_id`)
/// or updated the first existing match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(String),
    Updated(u64),
}

impl UpsertOutcome {
    /// The new document's id when the upsert inserted one.
    pub fn inserted_id(&self) -> Option<&str> {
        match self {
            UpsertOutcome::Inserted(id) => Some(id),
            UpsertOutcome::Updated(_) => None,
        }
    }
}

fn ensure_unique_id(docs: &[Document], id: &str) -> Result<()> {
    if docs.iter().any(|doc| doc_id(doc) == Some(id)) {
        return Err(ShotbaseError::validation(format!(
            "duplicate _id '{}'",
            id
        )));
    }
    Ok(())
}

pub(crate) fn insert_one(docs: &mut Vec<Document>, fields: Document) -> Result<String> {
    let (id, doc) = stamp_new(fields)?;
    ensure_unique_id(docs, &id)?;
    docs.push(doc);
    Ok(id)
}

/// Batch insert. Every document is stamped and validated before the first
/// one lands, so a bad batch leaves the collection untouched.
pub(crate) fn insert_many(docs: &mut Vec<Document>, batch: Vec<Document>) -> Result<Vec<String>> {
    let mut staged = Vec::with_capacity(batch.len());
    let mut ids = Vec::with_capacity(batch.len());
    for fields in batch {
        let (id, doc) = stamp_new(fields)?;
        ensure_unique_id(docs, &id)?;
        if ids.contains(&id) {
            return Err(ShotbaseError::validation(format!(
                "duplicate _id '{}' within insert batch",
                id
            )));
        }
        ids.push(id);
        staged.push(doc);
    }
    docs.append(&mut staged);
    Ok(ids)
}

/// Copy-on-read: results are owned clones, so callers can never alias the
/// stored sequence.
pub(crate) fn find(docs: &[Document], filter: &Value) -> Result<Vec<Document>> {
    let mut matches = Vec::new();
    for doc in docs {
        if matches_filter(doc, filter)? {
            matches.push(doc.clone());
        }
    }
    Ok(matches)
}

pub(crate) fn find_one(docs: &[Document], filter: &Value) -> Result<Option<Document>> {
    for doc in docs {
        if matches_filter(doc, filter)? {
            return Ok(Some(doc.clone()));
        }
    }
    Ok(None)
}

pub(crate) fn count(docs: &[Document], filter: &Value) -> Result<u64> {
    let mut total = 0;
    for doc in docs {
        if matches_filter(doc, filter)? {
            total += 1;
        }
    }
    Ok(total)
}

/// Updates the first document in scan order matching the filter. Returns
/// whether one matched.
pub(crate) fn update_one(docs: &mut [Document], filter: &Value, update: &Value) -> Result<bool> {
    for i in 0..docs.len() {
        if matches_filter(&docs[i], filter)? {
            docs[i] = apply_update(&docs[i], update)?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Updates every match and returns the modified count. New states are
/// staged first, so an update spec that fails on the third match leaves
/// the first two untouched as well.
pub(crate) fn update_many(docs: &mut [Document], filter: &Value, update: &Value) -> Result<u64> {
    let mut staged: Vec<(usize, Document)> = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        if matches_filter(doc, filter)? {
            staged.push((i, apply_update(doc, update)?));
        }
    }
    let modified = staged.len() as u64;
    for (i, next) in staged {
        docs[i] = next;
    }
    Ok(modified)
}

pub(crate) fn replace_one(
    docs: &mut [Document],
    filter: &Value,
    replacement: &Document,
) -> Result<bool> {
    for i in 0..docs.len() {
        if matches_filter(&docs[i], filter)? {
            docs[i] = apply_replace(&docs[i], replacement);
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn delete_one(docs: &mut Vec<Document>, filter: &Value) -> Result<bool> {
    for i in 0..docs.len() {
        if matches_filter(&docs[i], filter)? {
            docs.remove(i);
            return Ok(true);
        }
    }
    Ok(false)
}

/// Removes every match. Matching runs to completion before anything is
/// removed, so filter errors never leave a half-deleted collection.
pub(crate) fn delete_many(docs: &mut Vec<Document>, filter: &Value) -> Result<u64> {
    let mut matched = vec![false; docs.len()];
    let mut removed = 0u64;
    for (i, doc) in docs.iter().enumerate() {
        if matches_filter(doc, filter)? {
            matched[i] = true;
            removed += 1;
        }
    }
    if removed > 0 {
        let mut index = 0;
        docs.retain(|_| {
            let keep = !matched[index];
            index += 1;
            keep
        });
    }
    Ok(removed)
}

pub(crate) fn find_one_and_update(
    docs: &mut [Document],
    filter: &Value,
    update: &Value,
    return_document: ReturnDocument,
) -> Result<Option<Document>> {
    for i in 0..docs.len() {
        if matches_filter(&docs[i], filter)? {
            let before = docs[i].clone();
            let after = apply_update(&before, update)?;
            docs[i] = after.clone();
            return Ok(Some(match return_document {
                ReturnDocument::Before => before,
                ReturnDocument::After => after,
            }));
        }
    }
    Ok(None)
}

pub(crate) fn find_one_and_delete(
    docs: &mut Vec<Document>,
    filter: &Value,
) -> Result<Option<Document>> {
    for i in 0..docs.len() {
        if matches_filter(&docs[i], filter)? {
            return Ok(Some(docs.remove(i)));
        }
    }
    Ok(None)
}

/// Insert-if-absent-else-update. On insert, the new document is seeded
/// from the filter's equality fields and the update spec is applied on
/// top of that seed.
pub(crate) fn upsert(
    docs: &mut Vec<Document>,
    filter: &Value,
    update: &Value,
) -> Result<UpsertOutcome> {
    for i in 0..docs.len() {
        if matches_filter(&docs[i], filter)? {
            docs[i] = apply_update(&docs[i], update)?;
            return Ok(UpsertOutcome::Updated(1));
        }
    }
    let seed = seed_from_filter(filter)?;
    let staged = match classify_update(update)? {
        UpdateMode::Operators(_) => apply_update(&seed, update)?,
        UpdateMode::Replace(replacement) => {
            let mut merged = seed;
            for (key, value) in replacement {
                if !is_reserved_field(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
            merged
        }
    };
    let id = insert_one(docs, staged)?;
    Ok(UpsertOutcome::Inserted(id))
}

/// Distinct values of a dot-path field among matching documents, in
/// first-seen order.
pub(crate) fn distinct(docs: &[Document], field: &str, filter: &Value) -> Result<Vec<Value>> {
    let mut seen: Vec<Value> = Vec::new();
    for doc in docs {
        if matches_filter(doc, filter)? {
            if let Some(value) = doc_path(doc, field) {
                if !seen.contains(value) {
                    seen.push(value.clone());
                }
            }
        }
    }
    Ok(seen)
}
