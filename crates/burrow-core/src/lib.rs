//! Core types and traits for the Burrow URL shortener.
//!
//! This crate provides the record model, the repository contract every
//! storage backend implements, and the shared error type.

pub mod error;
pub mod repository;
pub mod short_id;

pub use error::{Result, StorageError};
pub use repository::{BatchEntry, ReadRepository, Repository, SaveOutcome, Stats, UrlRecord};
pub use short_id::ShortId;
