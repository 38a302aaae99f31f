//! Append-only log file backend.
//!
//! Every write appends one JSON object per record to the log:
//!
//! ```text
//! {"short_id":"abc123","original_url":"https://example.com","owner_id":"u1","deleted":false}
//! {"short_id":"abc123","original_url":"https://example.com","owner_id":"u1","deleted":true}
//! ```
//!
//! The file is read once, on open, and replayed in order into the same
//! [`Index`] the memory backend uses; the last line for a short id wins.
//! After that all reads are served from memory and the file is only ever
//! appended to, except by [`Repository::clear`], which truncates it.

use crate::index::{Index, SavePlan};
use async_trait::async_trait;
use burrow_core::{
    BatchEntry, ReadRepository, Repository, Result, SaveOutcome, ShortId, Stats, StorageError,
    UrlRecord,
};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

/// Configuration for [`FileRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct FileRepositoryConfig {
    /// Location of the log. Created if it does not exist.
    #[builder(setter(into))]
    pub path: PathBuf,
    /// Call `fsync` (data only) after every append.
    #[builder(default = false)]
    pub sync_writes: bool,
}

struct LogState {
    index: Index,
    file: File,
}

impl LogState {
    /// Appends `records` with a single write so a batch lands contiguously
    /// and in order.
    fn append(&mut self, records: &[UrlRecord], sync: bool) -> Result<()> {
        let mut buf = Vec::with_capacity(records.len() * 128);
        for record in records {
            serde_json::to_writer(&mut buf, record)
                .map_err(|e| StorageError::InvalidData(format!("failed to encode record: {e}")))?;
            buf.push(b'\n');
        }

        self.file.write_all(&buf)?;
        if sync {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

/// File-backed implementation of the repository contract.
///
/// The log is the durability mechanism; the in-memory index is authoritative
/// for the running process. Writes validate against the index, append to the
/// log, and only then update the index, all under the same exclusive lock, so
/// a failed append leaves the repository unchanged.
pub struct FileRepository {
    path: PathBuf,
    sync_writes: bool,
    state: RwLock<LogState>,
}

impl FileRepository {
    /// Opens (or creates) the log at `config.path` and replays it.
    pub fn open(config: FileRepositoryConfig) -> Result<Self> {
        let mut file = open_log(&config.path)?;
        let index = replay(&mut file, &config.path)?;

        Ok(Self {
            path: config.path,
            sync_writes: config.sync_writes,
            state: RwLock::new(LogState { index, file }),
        })
    }

    /// Returns the location of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRepository")
            .field("path", &self.path)
            .field("sync_writes", &self.sync_writes)
            .finish_non_exhaustive()
    }
}

fn open_log(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?)
}

/// Rebuilds the index from the log. Lines that fail to decode are skipped.
fn replay(file: &mut File, path: &Path) -> Result<Index> {
    let mut index = Index::new();
    let mut reader = BufReader::new(&*file);
    let mut line = Vec::new();
    let mut line_number = 0usize;
    let mut applied = 0usize;
    let mut skipped = 0usize;
    let mut terminated = true;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_number += 1;
        terminated = line.ends_with(b"\n");

        let content = line.trim_ascii();
        if content.is_empty() {
            continue;
        }

        match serde_json::from_slice::<UrlRecord>(content) {
            Ok(record) => {
                let short_id = record.short_id.clone();
                if let Some(live) = index.replay(record) {
                    warn!(
                        path = %path.display(),
                        line = line_number,
                        short_id = %short_id,
                        live_id = %live,
                        "url already live under another id, keeping it deleted"
                    );
                }
                applied += 1;
            }
            Err(e) => {
                skipped += 1;
                warn!(
                    path = %path.display(),
                    line = line_number,
                    error = %e,
                    "skipping malformed log line"
                );
            }
        }
    }
    drop(reader);

    // A crash mid-append can leave a torn last line; terminate it so the
    // next append starts on a fresh line.
    if !terminated {
        file.write_all(b"\n")?;
    }

    info!(
        path = %path.display(),
        applied,
        skipped,
        records = index.len(),
        "replayed url log"
    );
    Ok(index)
}

#[async_trait]
impl ReadRepository for FileRepository {
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        Ok(self.state.read().index.get(id).cloned())
    }

    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.state.read().index.by_owner(owner_id))
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.state.read().index.stats())
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn save(&self, id: &ShortId, original_url: &str, owner_id: &str) -> Result<SaveOutcome> {
        let mut state = self.state.write();

        match state.index.plan_save(id, original_url, owner_id)? {
            SavePlan::Existing(existing) => Ok(SaveOutcome::Existing(existing)),
            SavePlan::Unchanged(id) => Ok(SaveOutcome::Created(id)),
            SavePlan::Insert(record) => {
                state.append(std::slice::from_ref(&record), self.sync_writes)?;
                debug!(short_id = %id, "appended url record");
                state.index.apply(record);
                Ok(SaveOutcome::Created(id.clone()))
            }
        }
    }

    async fn batch_save(&self, entries: &[BatchEntry], owner_id: &str) -> Result<()> {
        let mut state = self.state.write();

        let planned = state.index.plan_batch(entries, owner_id)?;
        if planned.is_empty() {
            return Ok(());
        }

        state.append(&planned, self.sync_writes)?;
        debug!(count = planned.len(), "appended url batch");
        for record in planned {
            state.index.apply(record);
        }
        Ok(())
    }

    async fn batch_delete(&self, owner_id: &str, ids: &[ShortId]) -> Result<()> {
        let mut state = self.state.write();

        let planned = state.index.plan_delete(owner_id, ids);
        if planned.is_empty() {
            return Ok(());
        }

        state.append(&planned, self.sync_writes)?;
        debug!(owner_id, deleted = planned.len(), "appended soft deletes");
        for record in planned {
            state.index.apply(record);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write();

        let file = open_log(&self.path)?;
        file.set_len(0)?;
        state.file = file;
        state.index.clear();
        info!(path = %self.path.display(), "cleared url log");
        Ok(())
    }
}
