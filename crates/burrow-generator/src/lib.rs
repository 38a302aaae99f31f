pub mod random;
pub mod seq;

use burrow_core::ShortId;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

/// Trait for generating short ids.
///
/// Implementations are pure generators that don't interact with storage.
/// Uniqueness is best-effort: callers retry when the store reports an id
/// collision.
pub trait Generator: Send + Sync + 'static {
    /// Generates a new short id.
    fn generate(&self) -> ShortId;
}
