// shotbase-core/src/storage/file_storage.rs

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use uuid::Uuid;

use crate::document::{type_name, Document};
use crate::error::{Result, ShotbaseError};
use crate::storage::Storage;
use crate::{log_debug, log_error, log_trace};

/// One `<collection>.json` file per collection under a root directory, each
/// holding a pretty-printed JSON array of documents.
///
/// Saves write a temp sibling, flush and sync it, then rename it over the
/// target, so a reader sees either the old state or the new one and never a
/// torn file. Two processes writing the same collection still race (last
/// writer wins); there is no advisory locking.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Opens a storage root, creating the directory when missing.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| ShotbaseError::storage(&format!("create storage root {}", root.display()), e))?;
        log_debug!("opened storage root {}", root.display());
        Ok(FileStorage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.json", collection))
    }
}

impl Storage for FileStorage {
    fn load(&self, collection: &str) -> Result<Vec<Document>> {
        let path = self.collection_path(collection);
        let raw = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                log_error!("read failed for '{}': {}", collection, e);
                return Err(ShotbaseError::storage(&format!("read {}", path.display()), e));
            }
        };
        let parsed: Value = serde_json::from_slice(&raw).map_err(|e| {
            log_error!("collection '{}' does not parse as JSON: {}", collection, e);
            ShotbaseError::corrupted(collection, e.to_string())
        })?;
        let items = match parsed {
            Value::Array(items) => items,
            other => {
                return Err(ShotbaseError::corrupted(
                    collection,
                    format!("expected a JSON array, found {}", type_name(&other)),
                ))
            }
        };
        let mut docs = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(doc) => docs.push(doc),
                other => {
                    return Err(ShotbaseError::corrupted(
                        collection,
                        format!("array element is not an object: {}", type_name(&other)),
                    ))
                }
            }
        }
        log_trace!("loaded {} document(s) from '{}'", docs.len(), collection);
        Ok(docs)
    }

    fn save(&mut self, collection: &str, docs: &[Document]) -> Result<()> {
        let path = self.collection_path(collection);
        let tmp_path = self
            .root
            .join(format!("{}.json.tmp.{}", collection, Uuid::new_v4()));

        let write_result = (|| {
            let file = File::create(&tmp_path)
                .map_err(|e| ShotbaseError::storage(&format!("create {}", tmp_path.display()), e))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, docs).map_err(|e| {
                ShotbaseError::Storage(format!("serialize '{}': {}", collection, e))
            })?;
            writer
                .flush()
                .map_err(|e| ShotbaseError::storage(&format!("flush {}", tmp_path.display()), e))?;
            writer
                .into_inner()
                .map_err(|e| {
                    ShotbaseError::Storage(format!("flush {}: {}", tmp_path.display(), e))
                })?
                .sync_all()
                .map_err(|e| ShotbaseError::storage(&format!("sync {}", tmp_path.display()), e))?;
            fs::rename(&tmp_path, &path)
                .map_err(|e| ShotbaseError::storage(&format!("rename over {}", path.display()), e))
        })();

        if write_result.is_err() {
            // best effort: do not leave temp files behind on failure
            let _ = fs::remove_file(&tmp_path);
        }
        write_result?;
        log_trace!("saved {} document(s) to '{}'", docs.len(), collection);
        Ok(())
    }

    fn drop_collection(&mut self, collection: &str) -> Result<bool> {
        let path = self.collection_path(collection);
        match fs::remove_file(&path) {
            Ok(()) => {
                log_debug!("dropped collection '{}'", collection);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShotbaseError::storage(
                &format!("remove {}", path.display()),
                e,
            )),
        }
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| ShotbaseError::storage(&format!("read dir {}", self.root.display()), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| ShotbaseError::storage(&format!("read dir {}", self.root.display()), e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if let Some(name) = file_name.strip_suffix(".json") {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_storage() -> (TempDir, FileStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        (dir, storage)
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_load_missing_collection_is_empty() {
        let (_dir, storage) = open_storage();
        assert_eq!(storage.load("tasks").unwrap(), Vec::<Document>::new());
    }

    #[test]
    fn test_save_load_round_trip_preserves_order() {
        let (_dir, mut storage) = open_storage();
        let docs = vec![
            doc(json!({"_id": "b", "n": 2, "nested": {"x": [1, 2]}})),
            doc(json!({"_id": "a", "n": 1})),
            doc(json!({"_id": "c", "n": 3})),
        ];
        storage.save("tasks", &docs).unwrap();
        assert_eq!(storage.load("tasks").unwrap(), docs);
    }

    #[test]
    fn test_save_overwrites_previous_state() {
        let (_dir, mut storage) = open_storage();
        storage.save("tasks", &[doc(json!({"_id": "a"}))]).unwrap();
        storage.save("tasks", &[doc(json!({"_id": "b"}))]).unwrap();
        let loaded = storage.load("tasks").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].get("_id"), Some(&json!("b")));
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let (dir, mut storage) = open_storage();
        storage.save("tasks", &[doc(json!({"_id": "a"}))]).unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_collection_file_layout() {
        let (dir, mut storage) = open_storage();
        storage.save("versions", &[doc(json!({"_id": "v1"}))]).unwrap();
        assert!(dir.path().join("versions.json").is_file());
    }

    #[test]
    fn test_unparsable_file_is_corruption_not_empty() {
        let (dir, storage) = open_storage();
        std::fs::write(dir.path().join("tasks.json"), b"{ not json").unwrap();
        let err = storage.load("tasks").unwrap_err();
        assert!(matches!(err, ShotbaseError::CorruptedCollection { .. }));
    }

    #[test]
    fn test_non_array_top_level_is_corruption() {
        let (dir, storage) = open_storage();
        std::fs::write(dir.path().join("tasks.json"), b"{\"a\": 1}").unwrap();
        let err = storage.load("tasks").unwrap_err();
        assert!(matches!(err, ShotbaseError::CorruptedCollection { .. }));
    }

    #[test]
    fn test_non_object_element_is_corruption() {
        let (dir, storage) = open_storage();
        std::fs::write(dir.path().join("tasks.json"), b"[1, 2]").unwrap();
        let err = storage.load("tasks").unwrap_err();
        assert!(matches!(err, ShotbaseError::CorruptedCollection { .. }));
    }

    #[test]
    fn test_drop_collection() {
        let (dir, mut storage) = open_storage();
        storage.save("tasks", &[doc(json!({"_id": "a"}))]).unwrap();
        assert!(storage.drop_collection("tasks").unwrap());
        assert!(!dir.path().join("tasks.json").exists());
        assert!(!storage.drop_collection("tasks").unwrap());
        assert_eq!(storage.load("tasks").unwrap(), Vec::<Document>::new());
    }

    #[test]
    fn test_list_collections_sorted_and_filtered() {
        let (dir, mut storage) = open_storage();
        storage.save("versions", &[]).unwrap();
        storage.save("tasks", &[]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("stale.json.tmp.123"), b"[]").unwrap();
        assert_eq!(
            storage.list_collections().unwrap(),
            vec!["tasks".to_string(), "versions".to_string()]
        );
    }

    #[test]
    fn test_open_creates_nested_root() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("pipeline").join("db");
        let _storage = FileStorage::open(&nested).unwrap();
        assert!(nested.is_dir());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn simple_docs() -> impl Strategy<Value = Vec<Document>> {
            proptest::collection::vec(
                proptest::collection::btree_map("[a-z]{1,5}", any::<i64>(), 0..5).prop_map(
                    |fields| {
                        let mut doc = Document::new();
                        for (k, v) in fields {
                            doc.insert(k, json!(v));
                        }
                        doc
                    },
                ),
                0..8,
            )
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn save_load_round_trip(docs in simple_docs()) {
                let (_dir, mut storage) = open_storage();
                storage.save("prop", &docs).unwrap();
                prop_assert_eq!(storage.load("prop").unwrap(), docs);
            }
        }
    }
}
