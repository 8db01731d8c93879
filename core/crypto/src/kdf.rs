//! Key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks. Its work factor
//! is fixed per [`KdfParams`] profile so a vault sealed today can be opened
//! with the same parameters later.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::keys::{DerivedKey, Salt, KEY_LENGTH};
use crate::random::OsRandom;
use lockbox_common::{Error, Result};

/// Largest memory cost accepted, in KiB. Matches [`KdfParams::sensitive`].
pub const MAX_MEMORY_COST: u32 = 262_144;

/// Largest iteration count accepted.
pub const MAX_TIME_COST: u32 = 16;

/// Largest degree of parallelism accepted.
pub const MAX_PARALLELISM: u32 = 16;

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Custom parameters. Checked lazily by [`KdfParams::validate`].
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// Create parameters suitable for interactive use.
    ///
    /// These parameters provide a balance between security and usability,
    /// targeting approximately 0.5-1 second of derivation time.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Create parameters suitable for sensitive data.
    ///
    /// Higher security parameters that may take several seconds.
    pub fn sensitive() -> Self {
        Self {
            memory_cost: 262144, // 256 MiB
            time_cost: 4,
            parallelism: 4,
        }
    }

    /// Create moderate parameters for constrained devices.
    pub fn moderate() -> Self {
        Self {
            memory_cost: 32768, // 32 MiB
            time_cost: 3,
            parallelism: 2,
        }
    }

    /// Look up a named profile.
    pub fn from_profile(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "interactive" => Ok(Self::interactive()),
            "moderate" => Ok(Self::moderate()),
            "sensitive" => Ok(Self::sensitive()),
            other => Err(Error::InvalidInput(format!(
                "Unknown KDF profile '{}'. Use: interactive, moderate, or sensitive",
                other
            ))),
        }
    }

    /// Check that Argon2id accepts these parameters and that they stay
    /// within [`MAX_MEMORY_COST`], [`MAX_TIME_COST`] and [`MAX_PARALLELISM`].
    ///
    /// [`derive_key`] runs the same check before allocating.
    pub fn validate(&self) -> Result<()> {
        self.to_argon2().map(|_| ())
    }

    fn check_limits(&self) -> Result<()> {
        if self.memory_cost > MAX_MEMORY_COST {
            return Err(Error::Crypto(format!(
                "Invalid KDF parameters: memory cost {} KiB exceeds {} KiB",
                self.memory_cost, MAX_MEMORY_COST
            )));
        }
        if self.time_cost > MAX_TIME_COST {
            return Err(Error::Crypto(format!(
                "Invalid KDF parameters: time cost {} exceeds {}",
                self.time_cost, MAX_TIME_COST
            )));
        }
        if self.parallelism > MAX_PARALLELISM {
            return Err(Error::Crypto(format!(
                "Invalid KDF parameters: parallelism {} exceeds {}",
                self.parallelism, MAX_PARALLELISM
            )));
        }
        Ok(())
    }

    fn to_argon2(&self) -> Result<Params> {
        self.check_limits()?;
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_LENGTH),
        )
        .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Generate a fresh 32-byte salt from the operating system.
pub fn generate_salt() -> Result<Salt> {
    Salt::generate_with(&OsRandom)
}

/// Derive a key from a password and salt using Argon2id.
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// Empty, very long and non-ASCII passwords are all hashed as given. Whether
/// a password is required at all is decided by the caller.
///
/// # Errors
/// - Returns error if Argon2id parameters are invalid
///
/// # Security
/// - Password is not stored or logged
/// - Memory is zeroized after derivation
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<DerivedKey> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(password, salt.as_bytes(), &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    let key = DerivedKey::from_bytes(key_bytes);
    zeroize::Zeroize::zeroize(&mut key_bytes);
    Ok(key)
}

/// Verify that a password produces the expected key.
///
/// This performs constant-time comparison to prevent timing attacks.
pub fn verify_password(
    password: &[u8],
    salt: &Salt,
    params: &KdfParams,
    expected: &DerivedKey,
) -> Result<bool> {
    let derived = derive_key(password, salt, params)?;
    Ok(derived.as_bytes().ct_eq(expected.as_bytes()).into())
}
