//! Authenticated encryption using XChaCha20-Poly1305.
//!
//! XChaCha20-Poly1305 provides both confidentiality and authenticity,
//! with a 24-byte nonce that is safe for random generation. Every call to
//! [`encrypt`] draws a fresh nonce and returns it next to the ciphertext in a
//! [`SealedBox`], so the pairing is part of the type rather than a convention.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};

use crate::keys::DerivedKey;
use crate::random::{OsRandom, SecureRandom};
use lockbox_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Ciphertext together with the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    /// Random nonce, never reused with the same key.
    pub nonce: [u8; NONCE_SIZE],
    /// Encrypted data followed by the Poly1305 tag.
    pub ciphertext: Vec<u8>,
}

impl SealedBox {
    /// Build from separately stored parts.
    ///
    /// # Errors
    /// - Returns error if the nonce has the wrong length
    /// - Returns error if the ciphertext cannot hold a tag
    pub fn from_parts(nonce: &[u8], ciphertext: Vec<u8>) -> Result<Self> {
        let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Nonce must be {} bytes, got {}",
                NONCE_SIZE,
                nonce.len()
            ))
        })?;
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::InvalidInput("Ciphertext too short".to_string()));
        }
        Ok(Self { nonce, ciphertext })
    }

    /// Embedded layout: nonce || ciphertext || tag.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&self.ciphertext);
        result
    }

    /// Split an embedded nonce || ciphertext || tag buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::InvalidInput("Ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        Self::from_parts(nonce, ciphertext.to_vec())
    }
}

/// Encrypt plaintext using XChaCha20-Poly1305 with an OS-random nonce.
///
/// # Postconditions
/// - The nonce is randomly generated
/// - The ciphertext length is plaintext length + TAG_SIZE
///
/// # Security
/// - Authenticates the ciphertext with Poly1305
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> Result<SealedBox> {
    encrypt_with(&OsRandom, key, plaintext)
}

/// Encrypt plaintext drawing the nonce from an injected random source.
pub fn encrypt_with(
    rng: &dyn SecureRandom,
    key: &DerivedKey,
    plaintext: &[u8],
) -> Result<SealedBox> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill(&mut nonce)?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    Ok(SealedBox { nonce, ciphertext })
}

/// Decrypt a sealed box using XChaCha20-Poly1305.
///
/// # Postconditions
/// - Returns the original plaintext
/// - Verifies authentication tag before returning
///
/// # Errors
/// - Returns [`Error::Decryption`] if the key is wrong or the data was
///   altered. Both cases produce the same error.
pub fn decrypt(key: &DerivedKey, sealed: &SealedBox) -> Result<Vec<u8>> {
    if sealed.ciphertext.len() < TAG_SIZE {
        return Err(Error::Decryption);
    }

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map_err(|_| Error::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_LENGTH;
    use crate::random::SeededRandom;
    use proptest::prelude::*;

    fn key(byte: u8) -> DerivedKey {
        DerivedKey::from_bytes([byte; KEY_LENGTH])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = key(42);
        let plaintext = b"Hello, World!";

        let sealed = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &sealed).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ciphertext_size() {
        let key = key(42);
        let plaintext = b"Test message";

        let sealed = encrypt(&key, plaintext).unwrap();

        assert_eq!(sealed.ciphertext.len(), plaintext.len() + TAG_SIZE);
        assert_eq!(
            sealed.to_bytes().len(),
            NONCE_SIZE + plaintext.len() + TAG_SIZE
        );
    }

    #[test]
    fn test_different_nonce_each_time() {
        let key = key(42);
        let plaintext = b"Same plaintext";

        let ct1 = encrypt(&key, plaintext).unwrap();
        let ct2 = encrypt(&key, plaintext).unwrap();

        assert_ne!(ct1.nonce, ct2.nonce);
        assert_ne!(ct1.ciphertext, ct2.ciphertext);
    }

    #[test]
    fn test_injected_random_is_deterministic() {
        let key = key(42);
        let a = encrypt_with(&SeededRandom::new(11), &key, b"data").unwrap();
        let b = encrypt_with(&SeededRandom::new(11), &key, b"data").unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = encrypt(&key(1), b"Secret data").unwrap();
        let result = decrypt(&key(2), &sealed);

        assert!(matches!(result, Err(Error::Decryption)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = key(42);
        let mut sealed = encrypt(&key, b"Important data").unwrap();
        sealed.ciphertext[5] ^= 0xFF;

        assert!(matches!(decrypt(&key, &sealed), Err(Error::Decryption)));
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let key = key(42);
        let mut sealed = encrypt(&key, b"Important data").unwrap();
        sealed.nonce[0] ^= 0x01;

        assert!(matches!(decrypt(&key, &sealed), Err(Error::Decryption)));
    }

    #[test]
    fn test_truncated_box_fails_closed() {
        let sealed = SealedBox {
            nonce: [0u8; NONCE_SIZE],
            ciphertext: vec![1, 2, 3],
        };
        assert!(matches!(decrypt(&key(1), &sealed), Err(Error::Decryption)));
    }

    #[test]
    fn test_embedded_layout_roundtrip() {
        let key = key(3);
        let sealed = encrypt(&key, b"embedded").unwrap();

        let restored = SealedBox::from_bytes(&sealed.to_bytes()).unwrap();
        assert_eq!(restored, sealed);
        assert_eq!(decrypt(&key, &restored).unwrap(), b"embedded");

        assert!(SealedBox::from_bytes(&[0u8; NONCE_SIZE + TAG_SIZE - 1]).is_err());
        assert!(SealedBox::from_parts(&[0u8; 12], vec![0u8; TAG_SIZE]).is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let key = key(42);

        let sealed = encrypt(&key, b"").unwrap();
        let decrypted = decrypt(&key, &sealed).unwrap();

        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_large_plaintext() {
        let key = key(42);
        let plaintext = vec![0xABu8; 1_000_000]; // 1 MB

        let sealed = encrypt(&key, &plaintext).unwrap();
        let decrypted = decrypt(&key, &sealed).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_and_single_bit_tamper(
            plaintext in proptest::collection::vec(any::<u8>(), 0..256),
            flip in any::<prop::sample::Index>(),
        ) {
            let key = key(77);
            let sealed = encrypt(&key, &plaintext).unwrap();
            prop_assert_eq!(decrypt(&key, &sealed).unwrap(), plaintext);

            let mut tampered = sealed.clone();
            let idx = flip.index(tampered.ciphertext.len());
            tampered.ciphertext[idx] ^= 0x80;
            prop_assert!(matches!(decrypt(&key, &tampered), Err(Error::Decryption)));
        }
    }
}
