//! Background soft deletion.
//!
//! Deleting is fire-and-forget for the caller: [`DeletionQueue::enqueue`]
//! returns as soon as the request is queued, and a single worker task applies
//! requests to the repository in arrival order. Each `batch_delete` is still
//! one synchronous, atomic store write, so once it completes every later read
//! of those ids observes `deleted = true`.

use crate::error::{Result, ShortenerError};
use burrow_core::{Repository, ShortId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub owner_id: String,
    pub ids: Vec<ShortId>,
}

pub struct DeletionQueue {
    sender: mpsc::Sender<DeletionRequest>,
    worker: JoinHandle<()>,
}

impl DeletionQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn<R: Repository + ?Sized>(repository: Arc<R>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(repository, receiver));
        Self { sender, worker }
    }

    /// Queues a delete. Waits only if the queue is full.
    pub async fn enqueue(&self, owner_id: impl Into<String>, ids: Vec<ShortId>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.sender
            .send(DeletionRequest {
                owner_id: owner_id.into(),
                ids,
            })
            .await
            .map_err(|_| ShortenerError::QueueClosed)
    }

    /// Stops accepting requests and waits until every queued delete has been
    /// applied.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.worker.await {
            error!(error = %e, "deletion worker terminated abnormally");
        }
    }
}

async fn run_worker<R: Repository + ?Sized>(
    repository: Arc<R>,
    mut receiver: mpsc::Receiver<DeletionRequest>,
) {
    while let Some(request) = receiver.recv().await {
        match repository
            .batch_delete(&request.owner_id, &request.ids)
            .await
        {
            Ok(()) => debug!(
                owner_id = %request.owner_id,
                count = request.ids.len(),
                "applied deletion request"
            ),
            Err(e) => warn!(
                owner_id = %request.owner_id,
                count = request.ids.len(),
                error = %e,
                "failed to apply deletion request"
            ),
        }
    }
    debug!("deletion queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::ReadRepository;
    use burrow_storage::InMemoryRepository;

    fn id(s: &str) -> ShortId {
        ShortId::new_unchecked(s)
    }

    #[tokio::test]
    async fn queued_deletes_are_applied_before_shutdown_returns() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.save(&id("a"), "https://one.com", "u1").await.unwrap();
        repo.save(&id("b"), "https://two.com", "u1").await.unwrap();
        repo.save(&id("c"), "https://three.com", "u2").await.unwrap();

        let queue = DeletionQueue::spawn(Arc::clone(&repo), 4);
        queue.enqueue("u1", vec![id("a")]).await.unwrap();
        queue.enqueue("u1", vec![id("b"), id("c")]).await.unwrap();
        queue.shutdown().await;

        assert!(repo.get(&id("a")).await.unwrap().unwrap().deleted);
        assert!(repo.get(&id("b")).await.unwrap().unwrap().deleted);
        assert!(!repo.get(&id("c")).await.unwrap().unwrap().deleted);
    }

    #[tokio::test]
    async fn empty_request_is_not_queued() {
        let repo = Arc::new(InMemoryRepository::new());
        let queue = DeletionQueue::spawn(repo, 1);

        queue.enqueue("u1", Vec::new()).await.unwrap();
        queue.shutdown().await;
    }
}
