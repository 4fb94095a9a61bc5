//! Token fingerprints.
//!
//! The cache never stores raw tokens. Entries are keyed by the lowercase hex
//! SHA-256 of the token, and only a short prefix of that ever reaches logs.

use ring::digest::{digest, SHA256};
use std::fmt;

/// Number of hex characters shown in logs.
const LOG_PREFIX_LEN: usize = 12;

/// SHA-256 fingerprint of a bearer token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenFingerprint(String);

impl TokenFingerprint {
    pub fn of(token: &str) -> Self {
        Self(hex::encode(digest(&SHA256, token.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form for log fields.
    pub fn short(&self) -> &str {
        self.0.get(..LOG_PREFIX_LEN).unwrap_or(&self.0)
    }
}

impl fmt::Debug for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenFingerprint({}..)", self.short())
    }
}

impl fmt::Display for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}
