//! Live-state digests
//!
//! [`DigestBuilder`] is the running Blake3 hasher generated packages use to
//! fingerprint the live states they captured. [`ContentHash`] is its result,
//! rendered as lowercase hex in package versions.

use std::fmt::{self, Display, Formatter};

/// A 32-byte Blake3 digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Running Blake3 hasher
///
/// Fed one value at a time (live etags, in encounter order). Every value is
/// length-prefixed so `["ab", "c"]` and `["a", "bc"]` digest differently.
#[derive(Debug, Clone, Default)]
pub struct DigestBuilder {
    hasher: blake3::Hasher,
}

impl DigestBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one value
    pub fn update(&mut self, value: &str) {
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
    }

    /// Digest of everything fed so far
    #[inline]
    #[must_use]
    pub fn finish(&self) -> ContentHash {
        ContentHash(*self.hasher.finalize().as_bytes())
    }
}
