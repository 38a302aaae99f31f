use crate::file::{FileRepository, FileRepositoryConfig};
use crate::memory::InMemoryRepository;
use crate::sqlite::SqliteRepository;
use burrow_core::{Repository, Result};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Selects and configures the storage backend.
///
/// This is the only place that knows which backends exist; everything else
/// works against the `Arc<dyn Repository>` returned by [`open`].
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Memory,
    File(FileRepositoryConfig),
    Sqlite {
        database_url: String,
        max_connections: u32,
    },
}

impl StorageConfig {
    pub fn sqlite(database_url: impl Into<String>) -> Self {
        StorageConfig::Sqlite {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Display for StorageConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageConfig::Memory => write!(f, "memory"),
            StorageConfig::File(config) => write!(f, "file({})", config.path.display()),
            StorageConfig::Sqlite { database_url, .. } => write!(f, "sqlite({database_url})"),
        }
    }
}

/// Constructs the configured backend.
pub async fn open(config: StorageConfig) -> Result<Arc<dyn Repository>> {
    info!(backend = %config, "opening storage backend");

    let repository: Arc<dyn Repository> = match config {
        StorageConfig::Memory => Arc::new(InMemoryRepository::new()),
        StorageConfig::File(config) => Arc::new(FileRepository::open(config)?),
        StorageConfig::Sqlite {
            database_url,
            max_connections,
        } => Arc::new(SqliteRepository::connect(&database_url, max_connections).await?),
    };

    Ok(repository)
}
