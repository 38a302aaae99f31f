use crate::short_id::ShortId;
use thiserror::Error;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The short id is already taken by another record (live or deleted).
    #[error("short id already exists: {0}")]
    IdConflict(ShortId),
    /// A batch entry points at a URL that is already held by a live record.
    #[error("url already exists: {original_url} (short id {existing_id})")]
    UrlConflict {
        original_url: String,
        existing_id: ShortId,
    },
    #[error("invalid short id: {0}")]
    InvalidShortId(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Returns `true` for the conflicts a caller can resolve on its own
    /// (retry with a new id, or redirect to the existing one).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::IdConflict(_) | StorageError::UrlConflict { .. }
        )
    }
}
