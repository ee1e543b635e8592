// shotbase-core/src/storage/memory_storage.rs

use std::collections::HashMap;

use crate::document::Document;
use crate::error::Result;
use crate::storage::Storage;

/// In-memory backend with the same contract as `FileStorage`, minus
/// durability. Used for tests and throwaway databases.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: HashMap<String, Vec<Document>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }

    fn save(&mut self, collection: &str, docs: &[Document]) -> Result<()> {
        self.collections.insert(collection.to_string(), docs.to_vec());
        Ok(())
    }

    fn drop_collection(&mut self, collection: &str) -> Result<bool> {
        Ok(self.collections.remove(collection).is_some())
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
