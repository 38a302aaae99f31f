use crate::Generator;
use burrow_core::ShortId;
use std::iter;
use typed_builder::TypedBuilder;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates fixed-length random ids from the alphanumeric alphabet.
///
/// Eight characters give 62^8 (about 2.2e14) possible ids; collisions are
/// left to the caller's retry loop. Lengths are clamped to the range a
/// [`ShortId`] accepts.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGenerator {
    #[builder(default = 8, setter(transform = |length: usize| clamp_length(length)))]
    length: usize,
}

fn clamp_length(length: usize) -> usize {
    length.clamp(ShortId::MIN_LENGTH, ShortId::MAX_LENGTH)
}

impl RandomGenerator {
    pub fn with_length(length: usize) -> Self {
        Self {
            length: clamp_length(length),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortId {
        let id: String = iter::repeat_with(|| ALPHABET[rand::random_range(0..ALPHABET.len())] as char)
            .take(self.length)
            .collect();
        ShortId::new_unchecked(id)
    }
}
