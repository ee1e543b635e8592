// shotbase-core/src/error.rs

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Absence of a match is never an error: lookups report it through return
/// values (`None`, `0`, an empty vec). Only infrastructural failures and
/// invalid caller input travel through this type.
#[derive(Error, Debug)]
pub enum ShotbaseError {
    /// Disk or filesystem failure while touching a collection file.
    #[error("storage error: {0}")]
    Storage(String),

    /// A backing file exists but is not a JSON array of document objects.
    #[error("corrupted collection '{collection}': {reason}")]
    CorruptedCollection { collection: String, reason: String },

    /// Invalid caller input: unknown operator, malformed operand, reserved
    /// field misuse. Raised before any document is mutated.
    #[error("validation error: {0}")]
    Validation(String),
}

impl ShotbaseError {
    pub(crate) fn storage(context: &str, err: std::io::Error) -> Self {
        ShotbaseError::Storage(format!("{}: {}", context, err))
    }

    pub(crate) fn corrupted(collection: &str, reason: impl Into<String>) -> Self {
        ShotbaseError::CorruptedCollection {
            collection: collection.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ShotbaseError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ShotbaseError>;
