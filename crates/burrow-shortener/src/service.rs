use crate::error::{Result, ShortenerError};
use burrow_core::{BatchEntry, Repository, SaveOutcome, ShortId, Stats, StorageError, UrlRecord};
use burrow_generator::Generator;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// One URL of a batch request, tagged with a caller-chosen correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

/// The short id assigned to one [`BatchItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_id: ShortId,
}

/// What a short id points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(String),
    /// The record exists but has been soft-deleted.
    Gone,
    NotFound,
}

/// Shortening on top of a [`Repository`].
///
/// This service owns what the store leaves to its caller:
/// - URL validation
/// - Short id generation, with a retry when the store reports a taken id
/// - Translating store outcomes into service results
pub struct ShortenerService<R: Repository + ?Sized, G> {
    repository: Arc<R>,
    generator: G,
    max_attempts: usize,
}

impl<R: Repository + ?Sized, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: Arc<R>, generator: G) -> Self {
        Self {
            repository,
            generator,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets how many generated ids are tried before giving up.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Validates that the URL parses, is http or https, and names a host.
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let parsed = Url::parse(url)
            .map_err(|e| ShortenerError::InvalidUrl(format!("invalid URL format: {e}: {url}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {}",
                parsed.scheme()
            )));
        }

        if matches!(parsed.host_str(), None | Some("")) {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid host: {}",
                url
            )));
        }

        Ok(())
    }

    /// Shortens `original_url` on behalf of `owner_id`.
    ///
    /// Returns [`SaveOutcome::Existing`] if the URL was already shortened.
    pub async fn shorten(&self, original_url: &str, owner_id: &str) -> Result<SaveOutcome> {
        Self::validate_url(original_url)?;

        for attempt in 1..=self.max_attempts {
            let id = self.generator.generate();
            match self.repository.save(&id, original_url, owner_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(StorageError::IdConflict(taken)) => {
                    debug!(short_id = %taken, attempt, "short id collision, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(attempts = self.max_attempts, "gave up allocating a short id");
        Err(ShortenerError::Exhausted(self.max_attempts))
    }

    /// Shortens every item or none of them.
    pub async fn shorten_batch(&self, items: &[BatchItem], owner_id: &str) -> Result<Vec<BatchResult>> {
        for item in items {
            Self::validate_url(&item.original_url)?;
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        for attempt in 1..=self.max_attempts {
            let entries = self.batch_entries(items)?;
            match self.repository.batch_save(&entries, owner_id).await {
                Ok(()) => {
                    return Ok(items
                        .iter()
                        .zip(entries)
                        .map(|(item, entry)| BatchResult {
                            correlation_id: item.correlation_id.clone(),
                            short_id: entry.short_id,
                        })
                        .collect());
                }
                Err(StorageError::IdConflict(taken)) => {
                    debug!(short_id = %taken, attempt, "short id collision in batch, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(attempts = self.max_attempts, "gave up allocating short ids for batch");
        Err(ShortenerError::Exhausted(self.max_attempts))
    }

    /// Generates one id per item, distinct within the batch. Each item gets
    /// at most `max_attempts` draws.
    fn batch_entries(&self, items: &[BatchItem]) -> Result<Vec<BatchEntry>> {
        let mut used = HashSet::with_capacity(items.len());
        let mut entries = Vec::with_capacity(items.len());

        for item in items {
            let id = (0..self.max_attempts)
                .map(|_| self.generator.generate())
                .find(|id| used.insert(id.clone()))
                .ok_or_else(|| {
                    warn!(
                        attempts = self.max_attempts,
                        items = items.len(),
                        "generator repeated itself within a batch"
                    );
                    ShortenerError::Exhausted(self.max_attempts)
                })?;
            entries.push(BatchEntry::new(id, item.original_url.as_str()));
        }

        Ok(entries)
    }

    pub async fn resolve(&self, id: &ShortId) -> Result<Resolution> {
        let resolution = match self.repository.get(id).await? {
            Some(record) if record.deleted => Resolution::Gone,
            Some(record) => Resolution::Found(record.original_url),
            None => Resolution::NotFound,
        };
        Ok(resolution)
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.repository.get_by_owner(owner_id).await?)
    }

    pub async fn stats(&self) -> Result<Stats> {
        Ok(self.repository.stats().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_generator::{RandomGenerator, SeqGenerator};
    use burrow_storage::InMemoryRepository;

    struct FixedGenerator(&'static str);

    impl Generator for FixedGenerator {
        fn generate(&self) -> ShortId {
            ShortId::new_unchecked(self.0)
        }
    }

    fn test_service() -> ShortenerService<InMemoryRepository, SeqGenerator> {
        ShortenerService::new(Arc::new(InMemoryRepository::new()), SeqGenerator::with_prefix("b"))
    }

    fn item(correlation_id: &str, url: &str) -> BatchItem {
        BatchItem {
            correlation_id: correlation_id.to_string(),
            original_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn shorten_assigns_generated_id() {
        let service = test_service();

        let outcome = service.shorten("https://example.com", "u1").await.unwrap();
        assert_eq!(outcome, SaveOutcome::Created(ShortId::new_unchecked("b000000")));
    }

    #[tokio::test]
    async fn shorten_twice_returns_existing_id() {
        let service = test_service();

        let first = service.shorten("https://example.com", "u1").await.unwrap();
        let second = service.shorten("https://example.com", "u2").await.unwrap();

        assert!(second.is_conflict());
        assert_eq!(first.short_id(), second.short_id());
    }

    #[tokio::test]
    async fn shorten_retries_on_id_collision() {
        let service = test_service();
        service
            .repository()
            .save(&ShortId::new_unchecked("b000000"), "https://taken.com", "")
            .await
            .unwrap();

        let outcome = service.shorten("https://example.com", "u1").await.unwrap();
        assert_eq!(outcome, SaveOutcome::Created(ShortId::new_unchecked("b000001")));
    }

    #[tokio::test]
    async fn shorten_gives_up_after_max_attempts() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.save(&ShortId::new_unchecked("same"), "https://taken.com", "")
            .await
            .unwrap();
        let service = ShortenerService::new(repo, FixedGenerator("same")).with_max_attempts(3);

        let err = service.shorten("https://example.com", "u1").await.unwrap_err();
        assert!(matches!(err, ShortenerError::Exhausted(3)));
    }

    #[tokio::test]
    async fn shorten_rejects_invalid_urls() {
        let service = test_service();

        for url in [
            "",
            "not-a-url",
            "ftp://example.com",
            "javascript:alert(1)",
            "https://",
            "https://exa mple.com",
        ] {
            let err = service.shorten(url, "u1").await.unwrap_err();
            assert!(matches!(err, ShortenerError::InvalidUrl(_)), "{url}");
        }
    }

    #[tokio::test]
    async fn shorten_accepts_ports_queries_and_mixed_case_schemes() {
        let service = test_service();

        for url in [
            "http://localhost:8080",
            "https://example.com/path?query=1#frag",
            "HTTPS://Example.com",
        ] {
            assert!(service.shorten(url, "u1").await.is_ok(), "{url}");
        }
    }

    #[tokio::test]
    async fn shorten_batch_maps_correlation_ids() {
        let service = test_service();

        let results = service
            .shorten_batch(
                &[item("1", "https://one.com"), item("2", "https://two.com")],
                "u1",
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].correlation_id, "1");
        assert_eq!(results[1].correlation_id, "2");
        assert_eq!(
            service.resolve(&results[1].short_id).await.unwrap(),
            Resolution::Found("https://two.com".to_string())
        );
    }

    #[tokio::test]
    async fn shorten_batch_surfaces_url_conflict() {
        let service = test_service();
        let existing = service.shorten("https://one.com", "u1").await.unwrap();

        let err = service
            .shorten_batch(
                &[item("a", "https://new.com"), item("b", "https://one.com")],
                "u1",
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::UrlConflict { existing_id, .. } if &existing_id == existing.short_id()
        ));
        assert_eq!(service.stats().await.unwrap().urls, 1);
    }

    #[tokio::test]
    async fn shorten_batch_retries_on_id_collision() {
        let service = test_service();
        service
            .repository()
            .save(&ShortId::new_unchecked("b000001"), "https://taken.com", "")
            .await
            .unwrap();

        let results = service
            .shorten_batch(
                &[item("1", "https://one.com"), item("2", "https://two.com")],
                "u1",
            )
            .await
            .unwrap();

        assert_eq!(results[0].short_id.as_str(), "b000002");
        assert_eq!(results[1].short_id.as_str(), "b000003");
    }

    #[tokio::test]
    async fn shorten_batch_gives_up_when_ids_repeat_within_the_batch() {
        let service = ShortenerService::new(Arc::new(InMemoryRepository::new()), FixedGenerator("same"))
            .with_max_attempts(3);

        let err = service
            .shorten_batch(
                &[item("1", "https://one.com"), item("2", "https://two.com")],
                "u1",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::Exhausted(3)));
        assert_eq!(service.stats().await.unwrap().urls, 0);
    }

    #[tokio::test]
    async fn shorten_batch_terminates_when_the_id_space_is_too_small() {
        let service = ShortenerService::new(
            Arc::new(InMemoryRepository::new()),
            RandomGenerator::with_length(1),
        );
        let items: Vec<_> = (0..63)
            .map(|i| item(&i.to_string(), &format!("https://example.com/{i}")))
            .collect();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            service.shorten_batch(&items, "u1"),
        )
        .await
        .expect("batch did not terminate");

        assert!(matches!(result, Err(ShortenerError::Exhausted(DEFAULT_MAX_ATTEMPTS))));
    }

    #[tokio::test]
    async fn resolve_distinguishes_gone_from_missing() {
        let service = test_service();
        let id = service
            .shorten("https://example.com", "u1")
            .await
            .unwrap()
            .into_short_id();

        service
            .repository()
            .batch_delete("u1", std::slice::from_ref(&id))
            .await
            .unwrap();

        assert_eq!(service.resolve(&id).await.unwrap(), Resolution::Gone);
        assert_eq!(
            service
                .resolve(&ShortId::new_unchecked("nope"))
                .await
                .unwrap(),
            Resolution::NotFound
        );
    }

    #[tokio::test]
    async fn works_over_trait_objects() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let service = ShortenerService::new(repo, SeqGenerator::with_prefix("dyn"));

        service.shorten("https://example.com", "u1").await.unwrap();
        assert_eq!(service.list("u1").await.unwrap().len(), 1);
    }
}
