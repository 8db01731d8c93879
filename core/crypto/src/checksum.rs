//! Fast plaintext checksum.
//!
//! CRC-32 is not a security mechanism. It only lets a caller notice a
//! corrupted vault after decryption and report it as a warning; the AEAD tag
//! is what actually authenticates the data.

/// Compute the checksum of `data` as 8 lowercase hex digits.
pub fn checksum(data: &[u8]) -> String {
    format!("{:08x}", crc32fast::hash(data))
}

/// Check `data` against a previously recorded checksum.
///
/// Comparison ignores hex letter case and surrounding whitespace.
pub fn verify_checksum(data: &[u8], expected: &str) -> bool {
    checksum(data).eq_ignore_ascii_case(expected.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_value() {
        // CRC-32/ISO-HDLC check value
        assert_eq!(checksum(b"123456789"), "cbf43926");
        assert_eq!(checksum(b""), "00000000");
    }

    #[test]
    fn test_verify_is_case_insensitive() {
        assert!(verify_checksum(b"123456789", "CBF43926"));
        assert!(!verify_checksum(b"123456780", "cbf43926"));
    }

    proptest! {
        #[test]
        fn prop_checksum_is_stable_hex(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let sum = checksum(&data);
            prop_assert_eq!(sum.len(), 8);
            prop_assert!(sum.chars().all(|c| c.is_ascii_hexdigit()));
            prop_assert_eq!(sum, checksum(&data));
        }
    }
}
