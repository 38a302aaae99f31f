//! In-memory dedup index shared by the memory and file backends.
//!
//! The index is a plain data structure with no locking of its own. Backends
//! wrap it in a single reader-writer lock and split every write into two
//! steps: a `plan_*` call that validates against the current state and
//! returns the records to write, and [`Index::apply`] which commits them.
//! The file backend appends the planned records to its log in between, so a
//! failed append never leaves the index ahead of the log.

use burrow_core::{BatchEntry, Result, ShortId, Stats, StorageError, UrlRecord};
use std::collections::{HashMap, HashSet};

/// What a single save resolves to against the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SavePlan {
    /// Nothing to write. The URL already lives under this id.
    Existing(ShortId),
    /// The record is new and must be written.
    Insert(UrlRecord),
    /// The exact same record is already stored and live.
    Unchanged(ShortId),
}

#[derive(Debug, Default)]
pub(crate) struct Index {
    /// Every record ever stored, deleted ones included.
    records: HashMap<ShortId, UrlRecord>,
    /// Live records only.
    urls: HashMap<String, ShortId>,
}

impl Index {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, id: &ShortId) -> Option<&UrlRecord> {
        self.records.get(id)
    }

    pub(crate) fn plan_save(&self, id: &ShortId, original_url: &str, owner_id: &str) -> Result<SavePlan> {
        id.check()?;
        if let Some(existing) = self.urls.get(original_url) {
            if existing == id {
                return Ok(SavePlan::Unchanged(existing.clone()));
            }
            return Ok(SavePlan::Existing(existing.clone()));
        }

        if self.records.contains_key(id) {
            return Err(StorageError::IdConflict(id.clone()));
        }

        Ok(SavePlan::Insert(UrlRecord::new(id.clone(), original_url, owner_id)))
    }

    /// Validates a whole batch. Either every entry is insertable or the
    /// first offending entry is reported and nothing should be written.
    ///
    /// Entries whose URL is already live under the same id are left out of
    /// the returned records, as a single save would leave them unchanged.
    pub(crate) fn plan_batch(&self, entries: &[BatchEntry], owner_id: &str) -> Result<Vec<UrlRecord>> {
        validate_batch(entries)?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.urls.get(&entry.original_url) {
                Some(existing) if *existing == entry.short_id => continue,
                Some(existing) => {
                    return Err(StorageError::UrlConflict {
                        original_url: entry.original_url.clone(),
                        existing_id: existing.clone(),
                    });
                }
                None => {}
            }
            if self.records.contains_key(&entry.short_id) {
                return Err(StorageError::IdConflict(entry.short_id.clone()));
            }
            records.push(UrlRecord::new(
                entry.short_id.clone(),
                entry.original_url.as_str(),
                owner_id,
            ));
        }

        Ok(records)
    }

    /// Returns the deleted versions of the live records among `ids` owned by
    /// `owner_id`, each at most once.
    pub(crate) fn plan_delete(&self, owner_id: &str, ids: &[ShortId]) -> Vec<UrlRecord> {
        let mut seen = HashSet::with_capacity(ids.len());
        ids.iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.records.get(id))
            .filter(|record| record.is_live() && record.owner_id == owner_id)
            .map(|record| UrlRecord {
                deleted: true,
                ..record.clone()
            })
            .collect()
    }

    /// Stores `record`, replacing any previous version with the same id.
    ///
    /// Used both for planned writes and for log replay, where later lines
    /// override earlier ones.
    pub(crate) fn apply(&mut self, record: UrlRecord) {
        if let Some(previous) = self.records.get(&record.short_id) {
            if previous.is_live() && self.urls.get(&previous.original_url) == Some(&previous.short_id) {
                self.urls.remove(&previous.original_url);
            }
        }

        if record.is_live() {
            self.urls
                .insert(record.original_url.clone(), record.short_id.clone());
        }
        self.records.insert(record.short_id.clone(), record);
    }

    /// Applies a record read back from a log.
    ///
    /// A live record whose URL is already live under another id is stored
    /// as deleted, so each URL keeps at most one live id. Returns the id that
    /// kept the URL in that case.
    pub(crate) fn replay(&mut self, mut record: UrlRecord) -> Option<ShortId> {
        let live = match self.urls.get(&record.original_url) {
            Some(existing) if record.is_live() && *existing != record.short_id => Some(existing.clone()),
            _ => None,
        };
        if live.is_some() {
            record.deleted = true;
        }
        self.apply(record);
        live
    }

    pub(crate) fn by_owner(&self, owner_id: &str) -> Vec<UrlRecord> {
        let mut records: Vec<UrlRecord> = self
            .records
            .values()
            .filter(|record| record.is_live() && record.owner_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.short_id.cmp(&b.short_id));
        records
    }

    pub(crate) fn stats(&self) -> Stats {
        let mut owners = HashSet::new();
        let mut urls = 0;
        for record in self.records.values().filter(|record| record.is_live()) {
            urls += 1;
            if !record.owner_id.is_empty() {
                owners.insert(record.owner_id.as_str());
            }
        }

        Stats {
            urls,
            users: owners.len() as u64,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.urls.clear();
    }
}

/// Rejects batches that carry an invalid id or conflict with themselves: a
/// URL or an id repeated within the batch.
pub(crate) fn validate_batch(entries: &[BatchEntry]) -> Result<()> {
    let mut ids: HashSet<&ShortId> = HashSet::with_capacity(entries.len());
    let mut urls: HashMap<&str, &ShortId> = HashMap::with_capacity(entries.len());

    for entry in entries {
        entry.short_id.check()?;
        if let Some(first) = urls.get(entry.original_url.as_str()) {
            return Err(StorageError::UrlConflict {
                original_url: entry.original_url.clone(),
                existing_id: (*first).clone(),
            });
        }
        if !ids.insert(&entry.short_id) {
            return Err(StorageError::IdConflict(entry.short_id.clone()));
        }
        urls.insert(&entry.original_url, &entry.short_id);
    }

    Ok(())
}
