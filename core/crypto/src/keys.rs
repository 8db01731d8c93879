//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory. A derived key can be exported
//! to a string for session caching; that string is key material too and is
//! wrapped the same way.

use std::fmt;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::random::{OsRandom, SecureRandom};
use lockbox_common::{Error, Result};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of key derivation salts in bytes.
pub const SALT_LENGTH: usize = 32;

/// `kty` value of an exported key.
const EXPORT_KEY_TYPE: &str = "oct";

/// `alg` value of an exported key.
const EXPORT_ALGORITHM: &str = "XC20P";

/// Symmetric key derived from a master password.
///
/// Owned by the operation that derived it. There is deliberately no
/// `Clone` or `Serialize`; use [`export_key`] to cache it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Short public identifier of this key.
    ///
    /// The first 8 bytes of a domain-separated BLAKE2b-256 hash, hex encoded.
    /// Safe to log; it does not reveal the key.
    pub fn fingerprint(&self) -> String {
        use blake2::digest::consts::U32;
        use blake2::{Blake2b, Digest};

        let mut hasher = Blake2b::<U32>::new();
        hasher.update(b"lockbox-key-id");
        hasher.update(self.key);
        let digest = hasher.finalize();

        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

impl Eq for DerivedKey {}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Salt for key derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a random salt from the operating system.
    pub fn generate() -> Result<Self> {
        Self::generate_with(&OsRandom)
    }

    /// Generate a salt from an injected random source.
    pub fn generate_with(rng: &dyn SecureRandom) -> Result<Self> {
        let mut salt = [0u8; SALT_LENGTH];
        rng.fill(&mut salt)?;
        Ok(Self(salt))
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; SALT_LENGTH] = bytes.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Salt must be {} bytes, got {}",
                SALT_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}

/// Exported form of a [`DerivedKey`].
///
/// Treat it exactly like the key itself: it zeroizes on drop and its
/// `Debug` output is redacted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ExportedKey(String);

impl ExportedKey {
    /// Wrap a string obtained from a cache.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Get the encoded string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ExportedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExportedKey([REDACTED])")
    }
}

/// JSON body inside an exported key string.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(deny_unknown_fields)]
struct KeyRecord {
    kty: String,
    alg: String,
    k: String,
    kid: String,
}

/// Serialize a key for caching.
///
/// Format: standard base64 of `{"kty":"oct","alg":"XC20P","k":..,"kid":..}`
/// where `k` is the base64url key and `kid` its [`DerivedKey::fingerprint`].
pub fn export_key(key: &DerivedKey) -> Result<ExportedKey> {
    let record = KeyRecord {
        kty: EXPORT_KEY_TYPE.to_string(),
        alg: EXPORT_ALGORITHM.to_string(),
        k: URL_SAFE_NO_PAD.encode(key.as_bytes()),
        kid: key.fingerprint(),
    };

    let mut json = serde_json::to_vec(&record)?;
    let encoded = STANDARD.encode(&json);
    json.zeroize();

    Ok(ExportedKey(encoded))
}

/// Rebuild a key from its exported string.
///
/// # Errors
/// Returns [`Error::KeyDeserialization`] when the outer encoding is broken,
/// when it decodes to something other than a key record, when the record
/// names an unknown key type or algorithm, when the key is not exactly
/// [`KEY_LENGTH`] bytes, or when `kid` does not match the decoded key.
pub fn import_key(encoded: &str) -> Result<DerivedKey> {
    let mut json = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::KeyDeserialization(format!("Invalid base64: {}", e)))?;

    let parsed = serde_json::from_slice::<KeyRecord>(&json);
    json.zeroize();
    let record =
        parsed.map_err(|e| Error::KeyDeserialization(format!("Invalid key record: {}", e)))?;

    if record.kty != EXPORT_KEY_TYPE {
        return Err(Error::KeyDeserialization(format!(
            "Unsupported key type: {}",
            record.kty
        )));
    }
    if record.alg != EXPORT_ALGORITHM {
        return Err(Error::KeyDeserialization(format!(
            "Unsupported algorithm: {}",
            record.alg
        )));
    }

    let mut raw = URL_SAFE_NO_PAD
        .decode(record.k.as_bytes())
        .map_err(|_| Error::KeyDeserialization("Invalid key encoding".to_string()))?;

    if raw.len() != KEY_LENGTH {
        let len = raw.len();
        raw.zeroize();
        return Err(Error::KeyDeserialization(format!(
            "Key must be {} bytes, got {}",
            KEY_LENGTH, len
        )));
    }

    let mut bytes = [0u8; KEY_LENGTH];
    bytes.copy_from_slice(&raw);
    raw.zeroize();
    let key = DerivedKey::from_bytes(bytes);
    bytes.zeroize();

    if key.fingerprint() != record.kid {
        return Err(Error::KeyDeserialization(
            "Key identifier does not match key material".to_string(),
        ));
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;

    fn encode_record(json: &str) -> String {
        STANDARD.encode(json.as_bytes())
    }

    #[test]
    fn test_salt_generate() {
        let salt1 = Salt::generate().unwrap();
        let salt2 = Salt::generate().unwrap();

        // Random salts should be different
        assert_ne!(salt1.as_bytes(), salt2.as_bytes());
        assert_ne!(salt1.as_bytes(), &[0u8; SALT_LENGTH]);
        assert_ne!(salt2.as_bytes(), &[0u8; SALT_LENGTH]);
    }

    #[test]
    fn test_salt_generate_with_seeded_source() {
        let a = Salt::generate_with(&SeededRandom::new(3)).unwrap();
        let b = Salt::generate_with(&SeededRandom::new(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_salt_from_slice_length() {
        assert!(Salt::from_slice(&[1u8; SALT_LENGTH]).is_ok());
        assert!(Salt::from_slice(&[1u8; 16]).is_err());
    }

    #[test]
    fn test_key_equality_and_debug() {
        let a = DerivedKey::from_bytes([5u8; KEY_LENGTH]);
        let b = DerivedKey::from_bytes([5u8; KEY_LENGTH]);
        let c = DerivedKey::from_bytes([6u8; KEY_LENGTH]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(format!("{:?}", a), "DerivedKey([REDACTED])");
    }

    #[test]
    fn test_fingerprint_stable_and_distinct() {
        let a = DerivedKey::from_bytes([1u8; KEY_LENGTH]);
        let b = DerivedKey::from_bytes([2u8; KEY_LENGTH]);

        assert_eq!(a.fingerprint().len(), 16);
        assert_eq!(a.fingerprint(), DerivedKey::from_bytes([1u8; KEY_LENGTH]).fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_export_import_roundtrip_repeated() {
        let original = DerivedKey::from_bytes([9u8; KEY_LENGTH]);

        let mut current = import_key(export_key(&original).unwrap().as_str()).unwrap();
        for _ in 0..3 {
            let exported = export_key(&current).unwrap();
            current = import_key(exported.as_str()).unwrap();
        }

        assert_eq!(current, original);

        let sealed = crate::aead::encrypt(&original, b"cached session").unwrap();
        assert_eq!(
            crate::aead::decrypt(&current, &sealed).unwrap(),
            b"cached session"
        );

        let sealed = crate::aead::encrypt(&current, b"after import").unwrap();
        assert_eq!(
            crate::aead::decrypt(&original, &sealed).unwrap(),
            b"after import"
        );
    }

    #[test]
    fn test_exported_key_debug_redacted() {
        let exported = export_key(&DerivedKey::from_bytes([7u8; KEY_LENGTH])).unwrap();
        assert_eq!(format!("{:?}", exported), "ExportedKey([REDACTED])");
    }

    #[test]
    fn test_import_rejects_bad_base64() {
        let result = import_key("not base64 at all!!");
        assert!(matches!(result, Err(Error::KeyDeserialization(_))));
    }

    #[test]
    fn test_import_rejects_valid_base64_of_garbage() {
        let result = import_key(&encode_record("hello world"));
        assert!(matches!(result, Err(Error::KeyDeserialization(_))));

        let result = import_key(&encode_record("{\"kty\":\"oct\"}"));
        assert!(matches!(result, Err(Error::KeyDeserialization(_))));
    }

    #[test]
    fn test_import_rejects_wrong_algorithm() {
        let key = DerivedKey::from_bytes([4u8; KEY_LENGTH]);
        let json = format!(
            "{{\"kty\":\"oct\",\"alg\":\"A128GCM\",\"k\":\"{}\",\"kid\":\"{}\"}}",
            URL_SAFE_NO_PAD.encode(key.as_bytes()),
            key.fingerprint()
        );
        assert!(matches!(
            import_key(&encode_record(&json)),
            Err(Error::KeyDeserialization(_))
        ));
    }

    #[test]
    fn test_import_rejects_short_key() {
        let json = format!(
            "{{\"kty\":\"oct\",\"alg\":\"XC20P\",\"k\":\"{}\",\"kid\":\"00\"}}",
            URL_SAFE_NO_PAD.encode([1u8; 16])
        );
        assert!(matches!(
            import_key(&encode_record(&json)),
            Err(Error::KeyDeserialization(_))
        ));
    }

    #[test]
    fn test_import_rejects_mismatched_kid() {
        let key = DerivedKey::from_bytes([4u8; KEY_LENGTH]);
        let other = DerivedKey::from_bytes([8u8; KEY_LENGTH]);
        let json = format!(
            "{{\"kty\":\"oct\",\"alg\":\"XC20P\",\"k\":\"{}\",\"kid\":\"{}\"}}",
            URL_SAFE_NO_PAD.encode(key.as_bytes()),
            other.fingerprint()
        );
        assert!(matches!(
            import_key(&encode_record(&json)),
            Err(Error::KeyDeserialization(_))
        ));
    }
}
