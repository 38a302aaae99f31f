//! URL shortener service layer.
//!
//! This crate sits between a front end and the storage backends: it
//! validates URLs, generates short ids and retries on collisions, and runs
//! soft deletes in the background.

pub mod deletion;
pub mod error;
pub mod service;

pub use deletion::{DeletionQueue, DeletionRequest};
pub use error::ShortenerError;
pub use service::{BatchItem, BatchResult, Resolution, ShortenerService};
