//! Canonical plaintext form of a vault.
//!
//! The bytes produced here are what gets checksummed and encrypted, so the
//! transform must be pure: the same [`VaultData`] always yields the same
//! bytes. Struct fields serialize in declaration order, custom fields live in
//! a `BTreeMap`, and timestamps go through [`crate::timestamp`].

use tracing::debug;

use crate::record::VaultData;
use lockbox_common::{Error, Result};

/// Serialize a vault document to canonical bytes.
pub fn to_canonical_bytes(data: &VaultData) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(data)?;
    debug!(entries = data.entries.len(), bytes = bytes.len(), "Serialized vault");
    Ok(bytes)
}

/// Parse canonical bytes back into a vault document.
///
/// # Errors
/// - Returns [`Error::Serialization`] if the bytes are not a vault document
pub fn from_canonical_bytes(bytes: &[u8]) -> Result<VaultData> {
    let data: VaultData = serde_json::from_slice(bytes)
        .map_err(|e| Error::Serialization(format!("Invalid vault document: {}", e)))?;
    debug!(entries = data.entries.len(), "Deserialized vault");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Category, RecordDraft, VaultRecord};
    use proptest::prelude::*;

    fn sample_vault() -> VaultData {
        let mut data = VaultData::new("Personal");

        let mut draft = RecordDraft::new("Entrée 1", "alice", "correct horse");
        draft.url = Some("https://example.com".into());
        draft.tags = vec!["test".into(), "example".into()];
        draft.custom_fields.insert("pin".into(), "1234".into());
        draft.custom_fields.insert("answer".into(), "42".into());
        data.entries.push(VaultRecord::from_draft(draft).unwrap());

        let mut note = RecordDraft::new("Note", "", "n/a");
        note.category = Category::Note;
        note.notes = Some("line one\nline two".into());
        data.entries.push(VaultRecord::from_draft(note).unwrap());
        data
    }

    #[test]
    fn test_roundtrip_is_byte_identical() {
        let data = sample_vault();
        let bytes = to_canonical_bytes(&data).unwrap();

        let restored = from_canonical_bytes(&bytes).unwrap();
        assert_eq!(restored, data);
        assert_eq!(to_canonical_bytes(&restored).unwrap(), bytes);
    }

    #[test]
    fn test_timestamps_use_fixed_format() {
        let text = String::from_utf8(to_canonical_bytes(&sample_vault()).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        let created = value["createdAt"].as_str().unwrap();
        assert_eq!(created.len(), "2024-01-01T00:00:00.000Z".len());
        assert!(created.ends_with('Z'));
        assert_eq!(&created[19..20], ".");
    }

    #[test]
    fn test_custom_fields_sorted() {
        let text = String::from_utf8(to_canonical_bytes(&sample_vault()).unwrap()).unwrap();
        let answer = text.find("\"answer\"").unwrap();
        let pin = text.find("\"pin\"").unwrap();
        assert!(answer < pin);
    }

    #[test]
    fn test_foreign_offsets_normalize() {
        let json = r#"{"version":"1.0.0","name":"v","createdAt":"2024-01-01T02:00:00.5+02:00",
            "lastModified":"2024-01-01T00:00:00Z","entries":[]}"#;
        let data = from_canonical_bytes(json.as_bytes()).unwrap();
        let text = String::from_utf8(to_canonical_bytes(&data).unwrap()).unwrap();

        assert!(text.contains("\"createdAt\":\"2024-01-01T00:00:00.500Z\""));
        assert!(text.contains("\"lastModified\":\"2024-01-01T00:00:00.000Z\""));
    }

    #[test]
    fn test_rejects_non_vault_bytes() {
        assert!(matches!(
            from_canonical_bytes(b"{\"entries\":[]}"),
            Err(Error::Serialization(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_serialization_deterministic(
            title in "[a-zA-Z0-9 éü]{1,20}",
            password in "[ -~]{1,30}",
            tags in proptest::collection::vec("[a-z]{1,8}", 0..4),
        ) {
            let mut data = VaultData::new("prop");
            let mut draft = RecordDraft::new(title, "user", password);
            draft.tags = tags;
            if let Ok(record) = VaultRecord::from_draft(draft) {
                data.entries.push(record);
            }

            let first = to_canonical_bytes(&data).unwrap();
            let second = to_canonical_bytes(&from_canonical_bytes(&first).unwrap()).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
