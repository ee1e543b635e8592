// shotbase-core/src/transaction.rs
//! Staged multi-operation units of work.
//!
//! A transaction keeps a private working copy per touched collection,
//! loaded lazily from storage on first access. Operations mutate only the
//! working copies; nothing reaches storage until `commit` writes the
//! collections marked dirty. Dropping the context without committing
//! discards everything, which is how errors roll back.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;
use serde_json::Value;

use crate::collection;
use crate::collection::UpsertOutcome;
use crate::document::Document;
use crate::error::Result;
use crate::log_debug;
use crate::storage::{validate_collection_name, Storage};

pub struct TransactionContext<'db, S: Storage> {
    storage: &'db RwLock<S>,
    snapshots: HashMap<String, Vec<Document>>,
    dirty: BTreeSet<String>,
}

impl<'db, S: Storage> TransactionContext<'db, S> {
    pub(crate) fn new(storage: &'db RwLock<S>) -> Self {
        TransactionContext {
            storage,
            snapshots: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Working copy for a collection, loading it from storage on first
    /// touch. Later operations in the same transaction see earlier staged
    /// writes through this copy.
    fn working(&mut self, collection: &str) -> Result<&mut Vec<Document>> {
        validate_collection_name(collection)?;
        let storage = self.storage;
        match self.snapshots.entry(collection.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(storage.read().load(collection)?)),
        }
    }

    fn mark_dirty(&mut self, collection: &str) {
        self.dirty.insert(collection.to_string());
    }

    pub fn insert_one(&mut self, collection: &str, document: Document) -> Result<String> {
        let docs = self.working(collection)?;
        let id = collection::insert_one(docs, document)?;
        self.mark_dirty(collection);
        Ok(id)
    }

    pub fn insert_many(
        &mut self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<String>> {
        let docs = self.working(collection)?;
        let ids = collection::insert_many(docs, documents)?;
        if !ids.is_empty() {
            self.mark_dirty(collection);
        }
        Ok(ids)
    }

    pub fn find(&mut self, collection: &str, filter: &Value) -> Result<Vec<Document>> {
        let docs = self.working(collection)?;
        collection::find(docs, filter)
    }

    pub fn find_one(&mut self, collection: &str, filter: &Value) -> Result<Option<Document>> {
        let docs = self.working(collection)?;
        collection::find_one(docs, filter)
    }

    pub fn count(&mut self, collection: &str, filter: &Value) -> Result<u64> {
        let docs = self.working(collection)?;
        collection::count(docs, filter)
    }

    pub fn update_one(&mut self, collection: &str, filter: &Value, update: &Value) -> Result<bool> {
        let docs = self.working(collection)?;
        let matched = collection::update_one(docs, filter, update)?;
        if matched {
            self.mark_dirty(collection);
        }
        Ok(matched)
    }

    pub fn update_many(&mut self, collection: &str, filter: &Value, update: &Value) -> Result<u64> {
        let docs = self.working(collection)?;
        let modified = collection::update_many(docs, filter, update)?;
        if modified > 0 {
            self.mark_dirty(collection);
        }
        Ok(modified)
    }

    pub fn delete_one(&mut self, collection: &str, filter: &Value) -> Result<bool> {
        let docs = self.working(collection)?;
        let removed = collection::delete_one(docs, filter)?;
        if removed {
            self.mark_dirty(collection);
        }
        Ok(removed)
    }

    pub fn delete_many(&mut self, collection: &str, filter: &Value) -> Result<u64> {
        let docs = self.working(collection)?;
        let removed = collection::delete_many(docs, filter)?;
        if removed > 0 {
            self.mark_dirty(collection);
        }
        Ok(removed)
    }

    pub fn upsert(
        &mut self,
        collection: &str,
        filter: &Value,
        update: &Value,
    ) -> Result<UpsertOutcome> {
        let docs = self.working(collection)?;
        let outcome = collection::upsert(docs, filter, update)?;
        self.mark_dirty(collection);
        Ok(outcome)
    }

    /// Persists every dirty working copy. Collections that were only read
    /// are skipped.
    pub(crate) fn commit(self) -> Result<()> {
        let mut storage = self.storage.write();
        for collection in &self.dirty {
            if let Some(docs) = self.snapshots.get(collection) {
                storage.save(collection, docs)?;
            }
        }
        log_debug!("transaction committed {} collection(s)", self.dirty.len());
        Ok(())
    }
}
