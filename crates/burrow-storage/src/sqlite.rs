use crate::index::validate_batch;
use async_trait::async_trait;
use burrow_core::{
    BatchEntry, ReadRepository, Repository, Result, SaveOutcome, ShortId, Stats, StorageError,
    UrlRecord,
};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Stores `original_url` unless a live row already holds it, in which case the
/// live row is left as it is and its id is returned instead.
const UPSERT_URL: &str = r#"
    INSERT INTO short_urls (short_id, original_url, owner_id, deleted)
    VALUES (?, ?, ?, 0)
    ON CONFLICT (original_url) WHERE deleted = 0
    DO UPDATE SET short_id = short_urls.short_id
    RETURNING short_id
"#;

/// Upper bound on ids per `UPDATE ... IN (...)` statement.
const DELETE_CHUNK_SIZE: usize = 500;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite implementation of the repository contract.
///
/// Concurrency control is delegated to the database: dedup relies on the
/// unique partial index over live `original_url`s, and `save` is a single
/// upsert, so two racing saves of the same URL resolve inside SQLite and the
/// loser reads the winner's id back. Batches run in one transaction.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a repository from an existing connection pool.
    ///
    /// The schema is expected to be in place; see [`SqliteRepository::migrate`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url`, creating the database file if needed,
    /// and applies the schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(map_sqlx_error)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        let repository = Self::new(pool);
        repository.migrate().await?;
        info!(database_url, max_connections, "connected to sqlite");
        Ok(repository)
    }

    /// Opens a private in-memory database with the schema applied.
    ///
    /// The pool holds exactly one connection that is never recycled, since
    /// the database lives only as long as that connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(map_sqlx_error)?;

        let repository = Self::new(pool);
        repository.migrate().await?;
        Ok(repository)
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Unavailable(format!("migration failed: {e}")))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn live_id_for_url(&self, original_url: &str) -> Result<Option<ShortId>> {
        let row = sqlx::query(
            r#"
            SELECT short_id
            FROM short_urls
            WHERE original_url = ?
              AND deleted = 0
            "#,
        )
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|row| short_id_from_row(&row)).transpose()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn short_id_from_row(row: &SqliteRow) -> Result<ShortId> {
    let short_id: String = row.try_get("short_id").map_err(map_sqlx_error)?;
    Ok(ShortId::new_unchecked(short_id))
}

fn record_from_row(row: &SqliteRow) -> Result<UrlRecord> {
    Ok(UrlRecord {
        short_id: short_id_from_row(row)?,
        original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
        owner_id: row.try_get("owner_id").map_err(map_sqlx_error)?,
        deleted: row.try_get("deleted").map_err(map_sqlx_error)?,
    })
}

fn count_from_row(row: &SqliteRow, column: &str) -> Result<u64> {
    let count: i64 = row.try_get(column).map_err(map_sqlx_error)?;
    u64::try_from(count)
        .map_err(|_| StorageError::InvalidData(format!("negative {column} count: {count}")))
}

#[async_trait]
impl ReadRepository for SqliteRepository {
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(
            r#"
            SELECT short_id, original_url, owner_id, deleted
            FROM short_urls
            WHERE short_id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|row| record_from_row(&row)).transpose()
    }

    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT short_id, original_url, owner_id, deleted
            FROM short_urls
            WHERE owner_id = ?
              AND deleted = 0
            ORDER BY short_id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn stats(&self) -> Result<Stats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS urls,
                   COUNT(DISTINCT NULLIF(owner_id, '')) AS users
            FROM short_urls
            WHERE deleted = 0
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(Stats {
            urls: count_from_row(&row, "urls")?,
            users: count_from_row(&row, "users")?,
        })
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn save(&self, id: &ShortId, original_url: &str, owner_id: &str) -> Result<SaveOutcome> {
        id.check()?;
        let result = sqlx::query(UPSERT_URL)
            .bind(id.as_str())
            .bind(original_url)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => {
                let stored = short_id_from_row(&row)?;
                if stored == *id {
                    debug!(short_id = %id, "saved url record");
                    Ok(SaveOutcome::Created(stored))
                } else {
                    Ok(SaveOutcome::Existing(stored))
                }
            }
            // The primary key fired. If the URL is live anyway, report it
            // the same way the upsert branch would.
            Err(err) if is_unique_violation(&err) => match self.live_id_for_url(original_url).await? {
                Some(existing) if existing == *id => Ok(SaveOutcome::Created(existing)),
                Some(existing) => Ok(SaveOutcome::Existing(existing)),
                None => Err(StorageError::IdConflict(id.clone())),
            },
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn batch_save(&self, entries: &[BatchEntry], owner_id: &str) -> Result<()> {
        validate_batch(entries)?;
        if entries.is_empty() {
            return Ok(());
        }

        // Dropping `tx` on any early return rolls the whole batch back.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for entry in entries {
            let result = sqlx::query(UPSERT_URL)
                .bind(entry.short_id.as_str())
                .bind(entry.original_url.as_str())
                .bind(owner_id)
                .fetch_one(&mut *tx)
                .await;

            match result {
                Ok(row) => {
                    let stored = short_id_from_row(&row)?;
                    if stored != entry.short_id {
                        return Err(StorageError::UrlConflict {
                            original_url: entry.original_url.clone(),
                            existing_id: stored,
                        });
                    }
                }
                Err(err) if is_unique_violation(&err) => {
                    return Err(StorageError::IdConflict(entry.short_id.clone()));
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(count = entries.len(), "saved url batch");
        Ok(())
    }

    async fn batch_delete(&self, owner_id: &str, ids: &[ShortId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut deleted = 0;

        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "UPDATE short_urls SET deleted = 1 WHERE deleted = 0 AND owner_id = ",
            );
            builder.push_bind(owner_id);
            builder.push(" AND short_id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.as_str());
            }
            separated.push_unseparated(")");

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            deleted += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(owner_id, requested = ids.len(), deleted, "soft-deleted urls");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM short_urls")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
