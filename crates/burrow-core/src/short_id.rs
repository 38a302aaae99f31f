use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::Display;

/// A validated short identifier, the primary key of a stored URL.
///
/// Short ids are 1-64 characters long and contain only URL-safe characters:
/// ASCII alphanumerics, hyphens and underscores.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortId(String);

impl ShortId {
    pub const MIN_LENGTH: usize = 1;
    pub const MAX_LENGTH: usize = 64;

    /// Creates a new `ShortId` after validating the input.
    pub fn new(id: impl Into<String>) -> std::result::Result<Self, StorageError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Creates a `ShortId` without validation.
    ///
    /// Use this only for ids produced by trusted internal sources
    /// (generators, rows read back from a backend).
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Re-checks an id that may have been built with
    /// [`ShortId::new_unchecked`]. Stores call this before persisting.
    pub fn check(&self) -> std::result::Result<(), StorageError> {
        Self::validate(&self.0)
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    fn validate(id: &str) -> std::result::Result<(), StorageError> {
        if id.len() < Self::MIN_LENGTH || id.len() > Self::MAX_LENGTH {
            return Err(StorageError::InvalidShortId(format!(
                "length must be between {} and {}, got {}",
                Self::MIN_LENGTH,
                Self::MAX_LENGTH,
                id.len()
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StorageError::InvalidShortId(format!(
                "must contain only alphanumeric characters, hyphens, or underscores: '{}'",
                id
            )));
        }

        Ok(())
    }
}

impl Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ShortId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShortId {
    type Error = StorageError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShortId> for String {
    fn from(value: ShortId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        assert!(ShortId::new("a").is_ok());
        assert!(ShortId::new("Abc-123_xyz").is_ok());
        assert!(ShortId::new("a".repeat(64)).is_ok());
    }

    #[test]
    fn empty_and_too_long() {
        assert!(ShortId::new("").is_err());
        assert!(ShortId::new("a".repeat(65)).is_err());
    }

    #[test]
    fn check_catches_unchecked_ids() {
        assert!(ShortId::new_unchecked("abc").check().is_ok());
        assert!(ShortId::new_unchecked("").check().is_err());
        assert!(ShortId::new_unchecked("a".repeat(65)).check().is_err());
        assert!(ShortId::new_unchecked("a b").check().is_err());
    }

    #[test]
    fn invalid_characters() {
        assert!(ShortId::new("abc def").is_err());
        assert!(ShortId::new("abc/def").is_err());
        assert!(ShortId::new("abc?def").is_err());
    }

    #[test]
    fn to_url_trims_trailing_slash() {
        let id = ShortId::new("abc123").unwrap();
        assert_eq!(id.to_url("https://burrow.link"), "https://burrow.link/abc123");
        assert_eq!(id.to_url("https://burrow.link/"), "https://burrow.link/abc123");
    }

    #[test]
    fn deserialize_rejects_invalid_id() {
        let ok: ShortId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(ok.as_str(), "abc123");

        let err = serde_json::from_str::<ShortId>("\"not valid\"");
        assert!(err.is_err());
    }
}
