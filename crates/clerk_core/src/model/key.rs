//! Catalog key model shared by items and collections.
//!
//! # Responsibility
//! - Parse and format the 8-character catalog keys used by the desktop app.
//! - Generate fresh random keys for collections created by core.
//!
//! # Invariants
//! - A `CatalogKey` always matches `^[A-Z0-9]{8}$`.
//! - Generated keys draw every character uniformly from `[A-Z0-9]`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Number of characters in every catalog key.
pub const KEY_LENGTH: usize = 8;

const KEY_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
// Largest multiple of 36 that fits in a byte; higher bytes are rejected.
const UNBIASED_BYTE_LIMIT: u8 = 252;

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{8}$").expect("valid catalog key regex"));

/// Stable key of one catalog record (item or collection).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CatalogKey(String);

/// Key of one catalog item.
pub type ItemKey = CatalogKey;

/// Key of one collection node.
pub type CollectionKey = CatalogKey;

/// Rejected catalog key text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFormatError {
    pub value: String,
}

impl Display for KeyFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "catalog key must be {KEY_LENGTH} uppercase alphanumeric characters (got: {})",
            self.value
        )
    }
}

impl Error for KeyFormatError {}

impl CatalogKey {
    /// Parses one key, rejecting anything outside `^[A-Z0-9]{8}$`.
    pub fn parse(value: &str) -> Result<Self, KeyFormatError> {
        if !is_valid_key(value) {
            return Err(KeyFormatError {
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Generates a fresh random key.
    ///
    /// Uniqueness relies on the 36^8 keyspace; no lookup is performed.
    pub fn generate() -> Self {
        let mut key = String::with_capacity(KEY_LENGTH);
        while key.len() < KEY_LENGTH {
            let bytes = Uuid::new_v4().into_bytes();
            for (index, byte) in bytes.into_iter().enumerate() {
                // Bytes 6 and 8 carry the fixed UUID version/variant bits.
                if index == 6 || index == 8 || byte >= UNBIASED_BYTE_LIMIT {
                    continue;
                }
                key.push(char::from(
                    KEY_ALPHABET[usize::from(byte) % KEY_ALPHABET.len()],
                ));
                if key.len() == KEY_LENGTH {
                    break;
                }
            }
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns whether `value` is a well-formed catalog key.
pub fn is_valid_key(value: &str) -> bool {
    KEY_RE.is_match(value)
}

impl Display for CatalogKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CatalogKey {
    type Error = KeyFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !is_valid_key(&value) {
            return Err(KeyFormatError { value });
        }
        Ok(Self(value))
    }
}

impl From<CatalogKey> for String {
    fn from(value: CatalogKey) -> Self {
        value.0
    }
}

impl AsRef<str> for CatalogKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_key, CatalogKey};
    use std::collections::HashSet;

    #[test]
    fn parse_accepts_uppercase_alphanumeric_keys() {
        let key = CatalogKey::parse("ABCD1234").expect("valid key");
        assert_eq!(key.as_str(), "ABCD1234");
    }

    #[test]
    fn parse_rejects_lowercase_and_wrong_length() {
        assert!(CatalogKey::parse("abcd1234").is_err());
        assert!(CatalogKey::parse("ABC123").is_err());
        assert!(CatalogKey::parse("ABCD12345").is_err());
        assert!(CatalogKey::parse("ABCD-123").is_err());
    }

    #[test]
    fn generated_keys_are_well_formed_and_distinct() {
        let keys: HashSet<String> = (0..200)
            .map(|_| CatalogKey::generate().to_string())
            .collect();
        assert_eq!(keys.len(), 200);
        assert!(keys.iter().all(|key| is_valid_key(key)));
    }

    #[test]
    fn serde_round_trips_through_plain_string() {
        let key: CatalogKey = serde_json::from_str("\"ZXCV0987\"").expect("valid json key");
        assert_eq!(key.as_str(), "ZXCV0987");
        assert!(serde_json::from_str::<CatalogKey>("\"zxcv0987\"").is_err());
    }
}
