//! Common error types for lockbox.

use thiserror::Error;

/// Top-level error type for lockbox operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An encrypted operation was requested without a master password.
    #[error("Master password is required")]
    MissingMasterPassword,

    /// Input is not a lockbox envelope. No cryptography was attempted.
    #[error("Invalid envelope format: {0}")]
    InvalidEnvelopeFormat(String),

    /// The envelope declares a format version this build cannot open.
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(String),

    /// Authenticated decryption failed.
    ///
    /// The message is identical for a wrong key and for tampered data.
    #[error("Decryption failed")]
    Decryption,

    /// A serialized key string could not be turned back into a key.
    #[error("Key deserialization failed: {0}")]
    KeyDeserialization(String),

    /// Plaintext checksum differs from the one recorded at seal time.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Cryptographic setup failed (bad parameters, RNG failure).
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A record failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether this failure came out of the cryptographic envelope.
    ///
    /// These are terminal for the current operation and must not be retried
    /// with identical input.
    pub fn is_crypto_failure(&self) -> bool {
        matches!(
            self,
            Error::MissingMasterPassword
                | Error::InvalidEnvelopeFormat(_)
                | Error::UnsupportedVersion(_)
                | Error::Decryption
                | Error::KeyDeserialization(_)
                | Error::Crypto(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decryption_message_is_opaque() {
        assert_eq!(Error::Decryption.to_string(), "Decryption failed");
    }

    #[test]
    fn test_crypto_failure_classification() {
        assert!(Error::Decryption.is_crypto_failure());
        assert!(Error::MissingMasterPassword.is_crypto_failure());
        assert!(Error::UnsupportedVersion("9.0.0".into()).is_crypto_failure());
        assert!(!Error::Validation("title".into()).is_crypto_failure());
        assert!(!Error::ChecksumMismatch {
            expected: "a".into(),
            actual: "b".into()
        }
        .is_crypto_failure());
    }

    #[test]
    fn test_serde_json_error_converts() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
