//! Cryptographic primitives for lockbox.
//!
//! This module provides:
//! - Key derivation using Argon2id
//! - Authenticated encryption using XChaCha20-Poly1305
//! - Derived key handles with automatic zeroization and string export
//! - A fast plaintext checksum for corruption checks
//! - An injectable randomness capability for salts and nonces
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time operations for sensitive comparisons
//!
//! Nothing in this crate holds global mutable state. Each call receives its
//! password, salt and key as parameters, so concurrent use on different
//! vaults needs no locking.

pub mod aead;
pub mod checksum;
pub mod kdf;
pub mod keys;
pub mod random;

pub use aead::{decrypt, encrypt, encrypt_with, SealedBox, NONCE_SIZE, TAG_SIZE};
pub use checksum::{checksum, verify_checksum};
pub use kdf::{
    derive_key, generate_salt, verify_password, KdfParams, MAX_MEMORY_COST, MAX_PARALLELISM,
    MAX_TIME_COST,
};
pub use keys::{export_key, import_key, DerivedKey, ExportedKey, Salt, KEY_LENGTH, SALT_LENGTH};
pub use random::{OsRandom, SecureRandom, SeededRandom};
