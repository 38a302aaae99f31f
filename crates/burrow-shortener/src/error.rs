use burrow_core::{ShortId, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// A URL in a batch is already shortened.
    #[error("url already shortened as {existing_id}: {original_url}")]
    UrlConflict {
        original_url: String,
        existing_id: ShortId,
    },
    #[error("no free short id after {0} attempts")]
    Exhausted(usize),
    #[error("deletion queue is closed")]
    QueueClosed,
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::UrlConflict {
                original_url,
                existing_id,
            } => Self::UrlConflict {
                original_url,
                existing_id,
            },
            other => Self::Storage(other),
        }
    }
}
