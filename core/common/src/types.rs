//! Common types used throughout lockbox.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive data wrapper that zeroizes on drop.
///
/// Decrypted vault plaintext is handed out in this wrapper.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Interpret the bytes as UTF-8.
    pub fn as_str(&self) -> crate::Result<&str> {
        std::str::from_utf8(&self.0)
            .map_err(|e| crate::Error::Serialization(format!("Plaintext is not UTF-8: {}", e)))
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for SensitiveBytes {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}
