use crate::error::Result;
use crate::short_id::ShortId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A stored URL record.
///
/// This is also the on-disk shape of one line of the file backend's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The primary key, chosen by the caller at creation time.
    pub short_id: ShortId,
    /// The original URL that was shortened.
    pub original_url: String,
    /// The principal that created the record. May be empty.
    #[serde(default)]
    pub owner_id: String,
    /// Soft-delete flag. Only ever transitions from `false` to `true`.
    #[serde(default)]
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates a live record.
    pub fn new(short_id: ShortId, original_url: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            short_id,
            original_url: original_url.into(),
            owner_id: owner_id.into(),
            deleted: false,
        }
    }

    /// Returns `true` if the record has not been soft-deleted.
    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// One entry of a batch save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub short_id: ShortId,
    pub original_url: String,
}

impl BatchEntry {
    pub fn new(short_id: ShortId, original_url: impl Into<String>) -> Self {
        Self {
            short_id,
            original_url: original_url.into(),
        }
    }
}

/// The result of a single-record save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The record was stored under the requested id.
    Created(ShortId),
    /// The URL is already held by a live record; nothing was written and the
    /// existing id is returned instead.
    Existing(ShortId),
}

impl SaveOutcome {
    /// The id the URL is reachable under after the save.
    pub fn short_id(&self) -> &ShortId {
        match self {
            SaveOutcome::Created(id) | SaveOutcome::Existing(id) => id,
        }
    }

    pub fn into_short_id(self) -> ShortId {
        match self {
            SaveOutcome::Created(id) | SaveOutcome::Existing(id) => id,
        }
    }

    /// Returns `true` if the URL had already been shortened.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SaveOutcome::Existing(_))
    }
}

/// Aggregate counters over live records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of live records.
    pub urls: u64,
    /// Number of distinct, non-empty owner ids among live records.
    pub users: u64,
}

/// A read-only view of a repository.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the record stored under `id`.
    ///
    /// Returns `None` if the id is unknown. Soft-deleted records are returned
    /// with `deleted` set so callers can tell "gone" from "never existed".
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>>;

    /// Returns every live record created by `owner_id`.
    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<UrlRecord>>;

    /// Counts live records and their distinct non-empty owners.
    async fn stats(&self) -> Result<Stats>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Stores `original_url` under `id`.
    ///
    /// If a live record already holds `original_url`, nothing is written and
    /// [`SaveOutcome::Existing`] carries that record's id. Returns
    /// `Err(IdConflict)` if `id` is already taken.
    async fn save(&self, id: &ShortId, original_url: &str, owner_id: &str) -> Result<SaveOutcome>;

    /// Stores every entry or none of them.
    ///
    /// Fails with `UrlConflict` if any URL is already live (or repeated within
    /// the batch) and with `IdConflict` if any id is taken.
    async fn batch_save(&self, entries: &[BatchEntry], owner_id: &str) -> Result<()>;

    /// Soft-deletes the live records among `ids` that belong to `owner_id`.
    ///
    /// Unknown ids and ids owned by someone else are skipped silently.
    async fn batch_delete(&self, owner_id: &str, ids: &[ShortId]) -> Result<()>;

    /// Resets the repository to an empty state.
    async fn clear(&self) -> Result<()>;
}
