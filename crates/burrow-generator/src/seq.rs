use crate::Generator;
use burrow_core::ShortId;
use std::sync::atomic::{AtomicU64, Ordering};

/// A sequential id generator.
///
/// This generator produces codes like "b000000", "b000001", etc. Ids are
/// unique within a single instance; restarting it against a persistent store
/// yields collisions, which the service layer resolves by retrying.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl SeqGenerator {
    /// Creates a new generator with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Creates a new generator starting from a specific counter value.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> ShortId {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        ShortId::new_unchecked(format!("{}{:06}", self.prefix, count))
    }
}
