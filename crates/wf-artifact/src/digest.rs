//! Code digests
//!
//! Provides [`CodeDigest`], a strongly-typed 32-byte hash that binds a
//! security nonce to exactly one code payload.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte code digest (Blake3)
///
/// Immutable and cheap to clone (Copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodeDigest([u8; 32]);

impl CodeDigest {
    /// Create a digest from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Digest a code string
    #[inline]
    #[must_use]
    pub fn of(code: &str) -> Self {
        Self(*blake3::hash(code.as_bytes()).as_bytes())
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for CodeDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for CodeDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(DigestError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl serde::Serialize for CodeDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for CodeDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors when decoding a digest
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// Wrong number of bytes
    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Required byte count
        expected: usize,
        /// Decoded byte count
        actual: usize,
    },

    /// Not hexadecimal
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}
