// shotbase-core/src/find_options.rs

use std::cmp::Ordering;

use serde_json::Value;

use crate::document::{Document, FIELD_ID};
use crate::error::{Result, ShotbaseError};
use crate::value_utils::{compare_for_sort, doc_path, doc_remove_path, doc_set_path};

/// Post-processing options for `find_with_options`: multi-key sort, skip,
/// limit, and field projection, applied in that order.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Sort keys as `(dot-path, direction)` with direction `1` or `-1`.
    pub sort: Option<Vec<(String, i32)>>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    /// Projection entries as `(dot-path, mode)` with mode `1` (include) or
    /// `0` (exclude). `_id` rides along unless excluded explicitly.
    pub projection: Option<Vec<(String, i32)>>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort(mut self, keys: &[(&str, i32)]) -> Self {
        self.sort = Some(
            keys.iter()
                .map(|(path, direction)| (path.to_string(), *direction))
                .collect(),
        );
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_projection(mut self, fields: &[(&str, i32)]) -> Self {
        self.projection = Some(
            fields
                .iter()
                .map(|(path, mode)| (path.to_string(), *mode))
                .collect(),
        );
        self
    }
}

pub(crate) fn apply_find_options(
    mut docs: Vec<Document>,
    options: &FindOptions,
) -> Result<Vec<Document>> {
    if let Some(keys) = &options.sort {
        sort_documents(&mut docs, keys)?;
    }
    let skipped = docs.into_iter().skip(options.skip.unwrap_or(0));
    let docs: Vec<Document> = match options.limit {
        Some(limit) => skipped.take(limit).collect(),
        None => skipped.collect(),
    };
    match &options.projection {
        Some(projection) => project_documents(docs, projection),
        None => Ok(docs),
    }
}

/// Stable multi-key sort. All keys feed one composite comparison so a later
/// key only breaks ties left by earlier ones.
pub(crate) fn sort_documents(docs: &mut [Document], keys: &[(String, i32)]) -> Result<()> {
    for (path, direction) in keys {
        if *direction != 1 && *direction != -1 {
            return Err(ShotbaseError::validation(format!(
                "sort direction for '{}' must be 1 or -1, got {}",
                path, direction
            )));
        }
    }
    docs.sort_by(|a, b| {
        for (path, direction) in keys {
            let mut ordering = compare_for_sort(doc_path(a, path), doc_path(b, path));
            if *direction == -1 {
                ordering = ordering.reverse();
            }
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

/// Reshapes documents by an inclusion or exclusion projection. Any `1`
/// entry switches to inclusion mode; mixing non-`_id` inclusions with
/// exclusions is rejected.
pub(crate) fn project_documents(
    docs: Vec<Document>,
    projection: &[(String, i32)],
) -> Result<Vec<Document>> {
    for (path, mode) in projection {
        if *mode != 0 && *mode != 1 {
            return Err(ShotbaseError::validation(format!(
                "projection value for '{}' must be 0 or 1, got {}",
                path, mode
            )));
        }
    }
    let include_id = projection
        .iter()
        .find(|(path, _)| path == FIELD_ID)
        .map(|(_, mode)| *mode == 1)
        .unwrap_or(true);
    let inclusions: Vec<&String> = projection
        .iter()
        .filter(|(path, mode)| path != FIELD_ID && *mode == 1)
        .map(|(path, _)| path)
        .collect();
    let exclusions: Vec<&String> = projection
        .iter()
        .filter(|(path, mode)| path != FIELD_ID && *mode == 0)
        .map(|(path, _)| path)
        .collect();
    if !inclusions.is_empty() && !exclusions.is_empty() {
        return Err(ShotbaseError::validation(
            "projection cannot mix inclusion and exclusion",
        ));
    }
    let include_mode = projection.iter().any(|(_, mode)| *mode == 1);

    let projected = docs
        .into_iter()
        .map(|doc| {
            if include_mode {
                let mut out = Document::new();
                if include_id {
                    if let Some(id) = doc.get(FIELD_ID) {
                        out.insert(FIELD_ID.to_string(), id.clone());
                    }
                }
                for path in &inclusions {
                    if let Some(value) = doc_path(&doc, path) {
                        doc_set_path(&mut out, path, value.clone());
                    }
                }
                out
            } else {
                let mut out = doc;
                for path in &exclusions {
                    doc_remove_path(&mut out, path);
                }
                if !include_id {
                    out.shift_remove(FIELD_ID);
                }
                out
            }
        })
        .collect();
    Ok(projected)
}
