//! Content fingerprinting.
//!
//! A [`ContentHash`] is the dedup key for the whole system: a SHA-1
//! digest of a document's raw bytes, rendered as 40 lowercase hex
//! characters. Two byte sequences get the same hash iff they are
//! identical, so the `documents.content_hash` UNIQUE constraint is
//! what guarantees each piece of content is stored at most once.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Hex length of a rendered 160-bit digest.
const HEX_LEN: usize = 40;

/// Deterministic 160-bit content digest, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Fingerprint raw bytes. Pure and deterministic.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        ContentHash(format!("{:x}", hasher.finalize()))
    }

    /// Parse an existing hex digest (e.g. read back from storage).
    ///
    /// Accepts mixed case, stores lowercase. Returns `None` if the
    /// input is not exactly 40 hex characters.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(ContentHash(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
