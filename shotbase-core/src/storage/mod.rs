// shotbase-core/src/storage/mod.rs
//! Collection persistence.
//!
//! A collection travels as one unit: `load` hands back the full document
//! sequence, `save` replaces it. Backends guarantee that a reader never
//! observes a partially written collection.

mod file_storage;
mod memory_storage;

pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;

use crate::document::Document;
use crate::error::{Result, ShotbaseError};

pub trait Storage: Send + Sync {
    /// Loads the full document sequence of a collection. A collection that
    /// was never written is empty, not an error.
    fn load(&self, collection: &str) -> Result<Vec<Document>>;

    /// Persists the full document sequence of a collection, creating it on
    /// first write.
    fn save(&mut self, collection: &str, docs: &[Document]) -> Result<()>;

    /// Removes a collection entirely. False when it did not exist.
    fn drop_collection(&mut self, collection: &str) -> Result<bool>;

    /// Sorted names of all existing collections.
    fn list_collections(&self) -> Result<Vec<String>>;
}

/// Collection names become file names, so they must stay flat: no path
/// separators, no leading dot, not empty.
pub(crate) fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ShotbaseError::validation("collection name must not be empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(ShotbaseError::validation(format!(
            "collection name '{}' must not contain path separators",
            name
        )));
    }
    if name.starts_with('.') {
        return Err(ShotbaseError::validation(format!(
            "collection name '{}' must not start with '.'",
            name
        )));
    }
    Ok(())
}
