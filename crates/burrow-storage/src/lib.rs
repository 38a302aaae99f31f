//! Storage backends for the Burrow URL shortener.
//!
//! Three interchangeable implementations of [`Repository`]:
//!
//! - [`InMemoryRepository`]: two hash maps behind one lock, no persistence.
//! - [`FileRepository`]: the same index, mirrored to an append-only JSON
//!   lines log that is replayed on open.
//! - [`SqliteRepository`]: a `short_urls` table, dedup through a unique
//!   index and a single upsert, batches in a transaction.

pub mod config;
pub mod file;
mod index;
pub mod memory;
pub mod sqlite;

pub use burrow_core::{
    BatchEntry, ReadRepository, Repository, SaveOutcome, ShortId, Stats, StorageError, UrlRecord,
};
pub use config::{open, StorageConfig};
pub use file::{FileRepository, FileRepositoryConfig};
pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;
