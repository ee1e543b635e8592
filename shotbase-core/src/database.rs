// src/database.rs
//! Database facade tying storage, queries, updates and aggregation
//! together.
//!
//! Every mutating operation runs one load, transform, save cycle under a
//! reentrant write lock, so persisted collections only ever hold fully
//! applied states. Reads load a point-in-time copy and never take the
//! write lock.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use serde::Serialize;
use serde_json::Value;

use crate::aggregation::run_pipeline;
use crate::collection;
use crate::collection::{ReturnDocument, UpsertOutcome};
use crate::document::Document;
use crate::error::Result;
use crate::find_options::{apply_find_options, FindOptions};
use crate::storage::{validate_collection_name, FileStorage, MemoryStorage, Storage};
use crate::transaction::TransactionContext;
use crate::{log_debug, log_info};

/// Per-collection document counts plus the overall total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub collections: BTreeMap<String, u64>,
    pub total_documents: u64,
}

/// Handle to one database. Cloning is cheap and clones share state, so a
/// handle can be passed to as many threads as needed.
pub struct Database<S: Storage> {
    storage: Arc<RwLock<S>>,
    // serializes mutations and whole transactions; reentrant so a facade
    // mutation issued inside a transaction closure cannot deadlock
    write_lock: Arc<ReentrantMutex<()>>,
}

impl<S: Storage> Clone for Database<S> {
    fn clone(&self) -> Self {
        Database {
            storage: Arc::clone(&self.storage),
            write_lock: Arc::clone(&self.write_lock),
        }
    }
}

impl Database<FileStorage> {
    /// Opens a file-backed database rooted at `path`, creating the
    /// directory when missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::logging::init_from_env();
        let storage = FileStorage::open(path)?;
        log_info!("database opened at {}", storage.root().display());
        Ok(Database::with_storage(storage))
    }
}

impl Database<MemoryStorage> {
    /// Fully in-memory database. Nothing survives the handle; useful for
    /// tests and scratch pipelines.
    pub fn in_memory() -> Self {
        crate::logging::init_from_env();
        Database::with_storage(MemoryStorage::new())
    }
}

impl<S: Storage> Database<S> {
    /// Wraps an arbitrary storage backend.
    pub fn with_storage(storage: S) -> Self {
        Database {
            storage: Arc::new(RwLock::new(storage)),
            write_lock: Arc::new(ReentrantMutex::new(())),
        }
    }

    // ========== INTERNAL READ / WRITE CYCLES ==========

    fn load(&self, collection: &str) -> Result<Vec<Document>> {
        validate_collection_name(collection)?;
        self.storage.read().load(collection)
    }

    /// One serialized load-transform-save cycle. The closure reports
    /// whether it changed anything; untouched collections are not written
    /// back, so a no-op never creates a file.
    fn mutate<R>(
        &self,
        collection: &str,
        op: &str,
        f: impl FnOnce(&mut Vec<Document>) -> Result<(R, bool)>,
    ) -> Result<R> {
        validate_collection_name(collection)?;
        let _guard = self.write_lock.lock();
        let mut docs = self.storage.read().load(collection)?;
        let (result, changed) = f(&mut docs)?;
        if changed {
            self.storage.write().save(collection, &docs)?;
            log_debug!("{} on '{}': {} document(s) now stored", op, collection, docs.len());
        }
        Ok(result)
    }

    // ========== INSERTS ==========

    /// Inserts one document and returns its `_id`.
    pub fn insert_one(&self, collection: &str, document: Document) -> Result<String> {
        self.mutate(collection, "insert_one", |docs| {
            let id = collection::insert_one(docs, document)?;
            Ok((id, true))
        })
    }

    /// Inserts a batch atomically and returns the ids in input order.
    pub fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<Vec<String>> {
        self.mutate(collection, "insert_many", |docs| {
            let ids = collection::insert_many(docs, documents)?;
            let changed = !ids.is_empty();
            Ok((ids, changed))
        })
    }

    // ========== QUERIES ==========

    /// All documents matching the filter, in insertion order.
    pub fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Document>> {
        let docs = self.load(collection)?;
        collection::find(&docs, filter)
    }

    /// First match in insertion order, if any.
    pub fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Document>> {
        let docs = self.load(collection)?;
        collection::find_one(&docs, filter)
    }

    /// `find` followed by sort, skip, limit and projection.
    pub fn find_with_options(
        &self,
        collection: &str,
        filter: &Value,
        options: &FindOptions,
    ) -> Result<Vec<Document>> {
        let matched = self.find(collection, filter)?;
        apply_find_options(matched, options)
    }

    pub fn count(&self, collection: &str, filter: &Value) -> Result<u64> {
        let docs = self.load(collection)?;
        collection::count(&docs, filter)
    }

    /// Distinct values of a dot-path field among matching documents, in
    /// first-seen order.
    pub fn distinct(&self, collection: &str, field: &str, filter: &Value) -> Result<Vec<Value>> {
        let docs = self.load(collection)?;
        collection::distinct(&docs, field, filter)
    }

    // ========== UPDATES ==========

    /// Applies the update to the first match. Returns whether a document
    /// matched.
    pub fn update_one(&self, collection: &str, filter: &Value, update: &Value) -> Result<bool> {
        self.mutate(collection, "update_one", |docs| {
            let matched = collection::update_one(docs, filter, update)?;
            Ok((matched, matched))
        })
    }

    /// Applies the update to every match and returns the modified count.
    pub fn update_many(&self, collection: &str, filter: &Value, update: &Value) -> Result<u64> {
        self.mutate(collection, "update_many", |docs| {
            let modified = collection::update_many(docs, filter, update)?;
            Ok((modified, modified > 0))
        })
    }

    /// Replaces the first match wholesale, keeping its `_id` and
    /// `_created_at`.
    pub fn replace_one(
        &self,
        collection: &str,
        filter: &Value,
        replacement: &Document,
    ) -> Result<bool> {
        self.mutate(collection, "replace_one", |docs| {
            let matched = collection::replace_one(docs, filter, replacement)?;
            Ok((matched, matched))
        })
    }

    /// Updates the first match if one exists, otherwise inserts a document
    /// seeded from the filter's equality fields with the update applied.
    pub fn upsert(&self, collection: &str, filter: &Value, update: &Value) -> Result<UpsertOutcome> {
        self.mutate(collection, "upsert", |docs| {
            let outcome = collection::upsert(docs, filter, update)?;
            Ok((outcome, true))
        })
    }

    /// Atomic update returning the matched document's image, either before
    /// or after the update.
    pub fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Value,
        update: &Value,
        return_document: ReturnDocument,
    ) -> Result<Option<Document>> {
        self.mutate(collection, "find_one_and_update", |docs| {
            let found = collection::find_one_and_update(docs, filter, update, return_document)?;
            let changed = found.is_some();
            Ok((found, changed))
        })
    }

    // ========== DELETES ==========

    /// Removes the first match. Returns whether a document matched.
    pub fn delete_one(&self, collection: &str, filter: &Value) -> Result<bool> {
        self.mutate(collection, "delete_one", |docs| {
            let removed = collection::delete_one(docs, filter)?;
            Ok((removed, removed))
        })
    }

    /// Removes every match and returns the removed count.
    pub fn delete_many(&self, collection: &str, filter: &Value) -> Result<u64> {
        self.mutate(collection, "delete_many", |docs| {
            let removed = collection::delete_many(docs, filter)?;
            Ok((removed, removed > 0))
        })
    }

    /// Removes the first match and hands it back.
    pub fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Value,
    ) -> Result<Option<Document>> {
        self.mutate(collection, "find_one_and_delete", |docs| {
            let removed = collection::find_one_and_delete(docs, filter)?;
            let changed = removed.is_some();
            Ok((removed, changed))
        })
    }

    // ========== AGGREGATION ==========

    /// Runs a staged pipeline over the collection and returns the stage
    /// output documents.
    pub fn aggregate(&self, collection: &str, pipeline: &Value) -> Result<Vec<Document>> {
        let docs = self.load(collection)?;
        run_pipeline(docs, pipeline)
    }

    // ========== TRANSACTIONS ==========

    /// Runs the closure against a staged view of the database and commits
    /// its writes only if it returns `Ok`. On `Err` the staged state is
    /// discarded and the error is handed back untouched.
    pub fn transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut TransactionContext<'_, S>) -> Result<R>,
    {
        let _guard = self.write_lock.lock();
        let mut tx = TransactionContext::new(&self.storage);
        let result = f(&mut tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ========== ADMINISTRATION ==========

    /// Removes a whole collection. Returns whether it existed.
    pub fn drop_collection(&self, collection: &str) -> Result<bool> {
        validate_collection_name(collection)?;
        let _guard = self.write_lock.lock();
        let existed = self.storage.write().drop_collection(collection)?;
        if existed {
            log_info!("dropped collection '{}'", collection);
        }
        Ok(existed)
    }

    /// Names of all stored collections, sorted.
    pub fn list_collections(&self) -> Result<Vec<String>> {
        self.storage.read().list_collections()
    }

    /// Document counts per collection plus the grand total.
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let mut collections = BTreeMap::new();
        let mut total_documents = 0u64;
        for name in self.list_collections()? {
            let count = self.storage.read().load(&name)?.len() as u64;
            total_documents += count;
            collections.insert(name, count);
        }
        Ok(DatabaseStats {
            collections,
            total_documents,
        })
    }
}
