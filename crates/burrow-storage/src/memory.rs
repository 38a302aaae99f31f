use crate::index::{Index, SavePlan};
use async_trait::async_trait;
use burrow_core::{
    BatchEntry, ReadRepository, Repository, Result, SaveOutcome, ShortId, Stats, UrlRecord,
};
use parking_lot::RwLock;
use tracing::debug;

/// In-memory implementation of the repository contract.
///
/// Both maps of the dedup index live behind one `RwLock`, so a save checks
/// the URL index and inserts the record atomically. State is lost when the
/// process exits.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    index: RwLock<Index>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, deleted ones included.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        Ok(self.index.read().get(id).cloned())
    }

    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.index.read().by_owner(owner_id))
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.index.read().stats())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save(&self, id: &ShortId, original_url: &str, owner_id: &str) -> Result<SaveOutcome> {
        let mut index = self.index.write();

        match index.plan_save(id, original_url, owner_id)? {
            SavePlan::Existing(existing) => Ok(SaveOutcome::Existing(existing)),
            SavePlan::Unchanged(id) => Ok(SaveOutcome::Created(id)),
            SavePlan::Insert(record) => {
                debug!(short_id = %id, "saving url record");
                index.apply(record);
                Ok(SaveOutcome::Created(id.clone()))
            }
        }
    }

    async fn batch_save(&self, entries: &[BatchEntry], owner_id: &str) -> Result<()> {
        let mut index = self.index.write();

        let planned = index.plan_batch(entries, owner_id)?;
        debug!(count = planned.len(), "saving url batch");
        for record in planned {
            index.apply(record);
        }
        Ok(())
    }

    async fn batch_delete(&self, owner_id: &str, ids: &[ShortId]) -> Result<()> {
        let mut index = self.index.write();

        let planned = index.plan_delete(owner_id, ids);
        debug!(owner_id, requested = ids.len(), deleted = planned.len(), "soft-deleting urls");
        for record in planned {
            index.apply(record);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.index.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn id(s: &str) -> ShortId {
        ShortId::new_unchecked(s)
    }

    #[tokio::test]
    async fn save_and_get() {
        let repo = InMemoryRepository::new();

        let outcome = repo
            .save(&id("abc123"), "https://example.com", "u1")
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Created(id("abc123")));

        let record = repo.get(&id("abc123")).await.unwrap().unwrap();
        assert_eq!(record.original_url, "https://example.com");
        assert_eq!(record.owner_id, "u1");
        assert!(!record.deleted);
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let repo = InMemoryRepository::new();
        assert!(repo.get(&id("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_url_returns_first_id() {
        let repo = InMemoryRepository::new();

        repo.save(&id("abc123"), "https://example.com", "u1")
            .await
            .unwrap();
        let outcome = repo
            .save(&id("zzz999"), "https://example.com", "u1")
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::Existing(id("abc123")));
        assert!(repo.get(&id("zzz999")).await.unwrap().is_none());
        assert_eq!(repo.stats().await.unwrap().urls, 1);
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_trace() {
        let repo = InMemoryRepository::new();
        repo.save(&id("taken"), "https://taken.com", "u1")
            .await
            .unwrap();

        let entries = [
            BatchEntry::new(id("first"), "https://first.com"),
            BatchEntry::new(id("second"), "https://taken.com"),
        ];
        let err = repo.batch_save(&entries, "u1").await.unwrap_err();

        assert!(err.is_conflict());
        assert!(repo.get(&id("first")).await.unwrap().is_none());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn clear_resets_state() {
        let repo = InMemoryRepository::new();
        repo.save(&id("abc123"), "https://example.com", "u1")
            .await
            .unwrap();

        repo.clear().await.unwrap();

        assert!(repo.is_empty());
        assert_eq!(repo.stats().await.unwrap(), Stats::default());
    }

    #[tokio::test]
    async fn concurrent_saves_of_same_url_agree_on_one_id() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..16u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.save(&id(&format!("id-{i:02}")), "https://example.com", "u1")
                    .await
                    .unwrap()
            }));
        }

        let mut outcomes = vec![];
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        let created: Vec<_> = outcomes.iter().filter(|o| !o.is_conflict()).collect();
        assert_eq!(created.len(), 1);
        let winner = created[0].short_id().clone();
        assert!(outcomes.iter().all(|o| o.short_id() == &winner));
        assert_eq!(repo.stats().await.unwrap().urls, 1);
    }
}
