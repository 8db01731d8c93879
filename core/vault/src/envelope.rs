//! Encrypted envelope: the portable, versioned container for a sealed vault.
//!
//! An envelope binds the KDF salt, the AEAD nonce, the ciphertext and some
//! clear-text metadata into one JSON object:
//!
//! ```json
//! {
//!   "data": "<base64 ciphertext+tag>",
//!   "salt": "<base64, or empty if prefixed to data>",
//!   "iv": "<base64, or empty if prefixed to data>",
//!   "version": "1.0.0",
//!   "kdf": { "memoryCost": 65536, "timeCost": 3, "parallelism": 4 },
//!   "metadata": { "name": "..", "createdAt": "..", "lastModified": "..",
//!                 "entryCount": 3, "checksum": "1a2b3c4d" }
//! }
//! ```
//!
//! Opening validates the whole structure before any key is derived. Only an
//! envelope that parses, carries a supported version and decodes into a
//! well-sized salt, nonce and ciphertext reaches the cipher.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::timestamp;
use lockbox_common::{Error, Result, SensitiveBytes};
use lockbox_crypto::{
    checksum, decrypt, derive_key, encrypt_with, verify_checksum, KdfParams, OsRandom, Salt,
    SealedBox, SecureRandom, NONCE_SIZE, SALT_LENGTH, TAG_SIZE,
};

/// Version stamped on newly sealed envelopes.
pub const CURRENT_VERSION: &str = "1.0.0";

/// Versions [`EnvelopeCodec::open`] accepts.
pub const SUPPORTED_VERSIONS: &[&str] = &[CURRENT_VERSION];

/// Clear-text metadata stored next to the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    pub name: String,
    #[serde(with = "timestamp::canonical")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::canonical")]
    pub last_modified: DateTime<Utc>,
    pub entry_count: u64,
    /// Checksum of the plaintext, see [`lockbox_crypto::checksum`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Caller-supplied description of what is being sealed.
#[derive(Debug, Clone, Default)]
pub struct SealInfo {
    pub name: String,
    pub entry_count: u64,
    /// Creation time to preserve. Defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

impl SealInfo {
    pub fn new(name: impl Into<String>, entry_count: u64) -> Self {
        Self {
            name: name.into(),
            entry_count,
            created_at: None,
        }
    }
}

/// Wire form of a sealed vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub data: String,
    pub salt: String,
    pub iv: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf: Option<KdfParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EnvelopeMetadata>,
}

impl EncryptedEnvelope {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse from JSON.
    ///
    /// # Errors
    /// - Returns [`Error::InvalidEnvelopeFormat`] if required fields are
    ///   missing or have the wrong type
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidEnvelopeFormat(e.to_string()))
    }

    /// Check the declared version against [`SUPPORTED_VERSIONS`].
    pub fn check_version(&self) -> Result<()> {
        let version = self.version.as_str();
        if version.trim().is_empty() {
            return Err(Error::InvalidEnvelopeFormat(
                "Missing envelope version".to_string(),
            ));
        }
        if !SUPPORTED_VERSIONS.iter().any(|v| *v == version) {
            return Err(Error::UnsupportedVersion(version.to_string()));
        }
        Ok(())
    }

    /// Decode and size-check the binary fields.
    ///
    /// Supports three layouts: separate salt and iv; iv prefixed to `data`;
    /// salt and iv both prefixed to `data` (salt first).
    fn decode(&self) -> Result<DecodedEnvelope> {
        self.check_version()?;

        if self.data.trim().is_empty() {
            return Err(Error::InvalidEnvelopeFormat("Missing data".to_string()));
        }
        let data = decode_field("data", &self.data)?;
        let mut rest = data.as_slice();

        let salt_bytes = if self.salt.trim().is_empty() {
            let (salt, tail) = take_prefix("salt", rest, SALT_LENGTH)?;
            rest = tail;
            salt.to_vec()
        } else {
            decode_field("salt", &self.salt)?
        };
        let salt = Salt::from_slice(&salt_bytes)
            .map_err(|e| Error::InvalidEnvelopeFormat(e.to_string()))?;

        let nonce = if self.iv.trim().is_empty() {
            let (nonce, tail) = take_prefix("iv", rest, NONCE_SIZE)?;
            rest = tail;
            nonce.to_vec()
        } else {
            decode_field("iv", &self.iv)?
        };

        if rest.len() < TAG_SIZE {
            return Err(Error::InvalidEnvelopeFormat(
                "Ciphertext too short".to_string(),
            ));
        }

        let sealed = SealedBox::from_parts(&nonce, rest.to_vec())
            .map_err(|e| Error::InvalidEnvelopeFormat(e.to_string()))?;

        let kdf = self.kdf.unwrap_or_default();
        kdf.validate()
            .map_err(|e| Error::InvalidEnvelopeFormat(e.to_string()))?;

        Ok(DecodedEnvelope { salt, sealed, kdf })
    }
}

/// An envelope that passed structural validation.
struct DecodedEnvelope {
    salt: Salt,
    sealed: SealedBox,
    kdf: KdfParams,
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| Error::InvalidEnvelopeFormat(format!("Field '{}' is not base64: {}", name, e)))
}

fn take_prefix<'a>(name: &str, bytes: &'a [u8], len: usize) -> Result<(&'a [u8], &'a [u8])> {
    if bytes.len() < len {
        return Err(Error::InvalidEnvelopeFormat(format!(
            "Data too short to hold embedded {}",
            name
        )));
    }
    Ok(bytes.split_at(len))
}

/// Outcome of comparing the recorded checksum with the decrypted plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// The checksum matched.
    Verified,
    /// The envelope carried no checksum.
    Absent,
    /// The checksum did not match. Decryption still succeeded.
    Mismatch { expected: String, actual: String },
}

/// Result of a successful [`EnvelopeCodec::open`].
#[derive(Debug)]
pub struct OpenedEnvelope {
    pub plaintext: SensitiveBytes,
    pub metadata: Option<EnvelopeMetadata>,
    pub checksum: ChecksumStatus,
}

impl OpenedEnvelope {
    /// Treat a checksum mismatch as an error.
    pub fn require_checksum(self) -> Result<Self> {
        if let ChecksumStatus::Mismatch { expected, actual } = &self.checksum {
            return Err(Error::ChecksumMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
            });
        }
        Ok(self)
    }
}

/// Whether `json` looks like an encrypted envelope rather than a plaintext
/// export. Does not validate it.
pub fn is_encrypted_envelope(json: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Object(map)) => {
            map.get("data").is_some_and(|v| v.is_string())
                && map.get("version").is_some_and(|v| v.is_string())
        }
        _ => false,
    }
}

/// Seals and opens envelopes.
///
/// The random source and KDF profile are injected at construction. The codec
/// itself holds no per-operation state and can be shared across threads.
#[derive(Clone)]
pub struct EnvelopeCodec {
    rng: Arc<dyn SecureRandom>,
    params: KdfParams,
}

impl EnvelopeCodec {
    /// Codec with OS randomness and the default KDF profile.
    pub fn new() -> Self {
        Self::with_params(KdfParams::default())
    }

    /// Codec with OS randomness and a chosen KDF profile.
    pub fn with_params(params: KdfParams) -> Self {
        Self::with_random(Arc::new(OsRandom), params)
    }

    /// Codec with an injected random source.
    pub fn with_random(rng: Arc<dyn SecureRandom>, params: KdfParams) -> Self {
        Self { rng, params }
    }

    /// KDF profile used for sealing.
    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Encrypt `plaintext` under `password`.
    ///
    /// # Postconditions
    /// - Fresh salt and nonce are drawn for every call
    /// - Metadata carries the plaintext checksum and the current time as
    ///   `lastModified`
    ///
    /// # Errors
    /// - [`Error::MissingMasterPassword`] if `password` is `None`
    /// - [`Error::Crypto`] if the KDF profile is invalid or randomness fails
    pub fn seal(
        &self,
        plaintext: &[u8],
        password: Option<&str>,
        info: SealInfo,
    ) -> Result<EncryptedEnvelope> {
        let password = password.ok_or(Error::MissingMasterPassword)?;

        let salt = Salt::generate_with(self.rng.as_ref())?;
        let key = derive_key(password.as_bytes(), &salt, &self.params)?;
        let sealed = encrypt_with(self.rng.as_ref(), &key, plaintext)?;

        let now = timestamp::now();
        let metadata = EnvelopeMetadata {
            name: info.name,
            created_at: info.created_at.map(timestamp::truncate).unwrap_or(now),
            last_modified: now,
            entry_count: info.entry_count,
            checksum: Some(checksum(plaintext)),
        };

        debug!(
            bytes = plaintext.len(),
            entries = metadata.entry_count,
            key = %key.fingerprint(),
            "Sealed envelope"
        );

        Ok(EncryptedEnvelope {
            data: STANDARD.encode(&sealed.ciphertext),
            salt: STANDARD.encode(salt.as_bytes()),
            iv: STANDARD.encode(sealed.nonce),
            version: CURRENT_VERSION.to_string(),
            kdf: Some(self.params),
            metadata: Some(metadata),
        })
    }

    /// Decrypt an envelope.
    ///
    /// # Errors
    /// - [`Error::MissingMasterPassword`] if `password` is `None`
    /// - [`Error::UnsupportedVersion`] for a version outside
    ///   [`SUPPORTED_VERSIONS`]
    /// - [`Error::InvalidEnvelopeFormat`] for undecodable or mis-sized fields
    /// - [`Error::Decryption`] for a wrong password or altered ciphertext
    ///
    /// A checksum mismatch is reported in [`OpenedEnvelope::checksum`], not
    /// as an error.
    pub fn open(
        &self,
        envelope: &EncryptedEnvelope,
        password: Option<&str>,
    ) -> Result<OpenedEnvelope> {
        let password = password.ok_or(Error::MissingMasterPassword)?;
        let decoded = envelope.decode()?;

        let key = derive_key(password.as_bytes(), &decoded.salt, &decoded.kdf)?;
        let plaintext = SensitiveBytes::new(decrypt(&key, &decoded.sealed)?);

        let checksum_status = match envelope
            .metadata
            .as_ref()
            .and_then(|m| m.checksum.as_deref())
        {
            None => ChecksumStatus::Absent,
            Some(expected) if verify_checksum(plaintext.as_bytes(), expected) => {
                ChecksumStatus::Verified
            }
            Some(expected) => {
                let actual = checksum(plaintext.as_bytes());
                warn!(expected, actual = %actual, "Envelope checksum mismatch");
                ChecksumStatus::Mismatch {
                    expected: expected.to_string(),
                    actual,
                }
            }
        };

        debug!(bytes = plaintext.len(), version = %envelope.version, "Opened envelope");

        Ok(OpenedEnvelope {
            plaintext,
            metadata: envelope.metadata.clone(),
            checksum: checksum_status,
        })
    }

    /// Parse JSON and open it in one step.
    pub fn open_json(&self, json: &str, password: Option<&str>) -> Result<OpenedEnvelope> {
        let password = password.ok_or(Error::MissingMasterPassword)?;
        let envelope = EncryptedEnvelope::from_json(json)?;
        self.open(&envelope, Some(password))
    }

    /// Re-encrypt under a new password with fresh salt and nonce.
    ///
    /// Name, creation time and entry count carry over.
    pub fn rekey(
        &self,
        envelope: &EncryptedEnvelope,
        old_password: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<EncryptedEnvelope> {
        let new_password = new_password.ok_or(Error::MissingMasterPassword)?;
        let opened = self.open(envelope, old_password)?;

        let info = match &opened.metadata {
            Some(meta) => SealInfo {
                name: meta.name.clone(),
                entry_count: meta.entry_count,
                created_at: Some(meta.created_at),
            },
            None => SealInfo::default(),
        };

        let resealed = self.seal(opened.plaintext.as_bytes(), Some(new_password), info)?;
        info!("Envelope re-encrypted under new password");
        Ok(resealed)
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
