// shotbase-core/src/lib.rs
// Embedded JSON document database - file-backed, no server process

pub mod collection;
pub mod database;
pub mod document;
pub mod error;
pub mod find_options;
pub mod logging;
pub mod query;
pub mod storage;
pub mod transaction;
pub mod value_utils;

mod aggregation;
mod update;

// Public exports
pub use collection::{ReturnDocument, UpsertOutcome};
pub use database::{Database, DatabaseStats};
pub use document::{new_document_id, Document, FIELD_CREATED_AT, FIELD_ID, FIELD_UPDATED_AT};
pub use error::{Result, ShotbaseError};
pub use find_options::FindOptions;
pub use logging::{log_level, set_log_level, LogLevel};
pub use query::matches_filter;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use transaction::TransactionContext;
