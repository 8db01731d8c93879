//! Loosely-typed record used by the plaintext import paths.
//!
//! JSON exports from older versions and CSV files from other tools omit ids,
//! timestamps and categories. Everything is optional here and gets checked
//! when converted into a [`VaultRecord`].

use std::collections::BTreeMap;

use serde::Deserialize;
use uuid::Uuid;

use crate::record::{Category, RecordDraft, VaultRecord};
use crate::timestamp;
use lockbox_common::{Error, Result};

/// A record as read from a plaintext export.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortableRecord {
    pub id: Option<String>,
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub favorite: bool,
    pub custom_fields: BTreeMap<String, String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub last_used: Option<String>,
}

impl PortableRecord {
    /// Validate and convert. Ids that are missing or not UUIDs are replaced.
    pub fn into_record(self) -> Result<VaultRecord> {
        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => Category::default(),
            Some(name) => name.parse()?,
        };

        let mut record = VaultRecord::from_draft(RecordDraft {
            title: self.title,
            username: self.username,
            password: self.password,
            url: self.url,
            notes: self.notes,
            tags: self.tags,
            category,
            favorite: self.favorite,
            custom_fields: self.custom_fields,
        })?;

        if let Some(id) = self.id.as_deref().and_then(|id| Uuid::parse_str(id.trim()).ok()) {
            record.id = id;
        }
        if let Some(created) = non_blank(&self.created_at) {
            record.created_at = parse_time(created)?;
            record.updated_at = record.created_at;
        }
        if let Some(updated) = non_blank(&self.updated_at) {
            record.updated_at = parse_time(updated)?;
        }
        if let Some(used) = non_blank(&self.last_used) {
            record.last_used = Some(parse_time(used)?);
        }
        Ok(record)
    }
}

impl From<&VaultRecord> for PortableRecord {
    fn from(record: &VaultRecord) -> Self {
        Self {
            id: Some(record.id.to_string()),
            title: record.title.clone(),
            username: record.username.clone(),
            password: record.password.clone(),
            url: record.url.clone(),
            notes: record.notes.clone(),
            tags: record.tags.clone(),
            category: Some(record.category.to_string()),
            favorite: record.favorite,
            custom_fields: record.custom_fields.clone(),
            created_at: Some(timestamp::format(&record.created_at)),
            updated_at: Some(timestamp::format(&record.updated_at)),
            last_used: record.last_used.as_ref().map(timestamp::format),
        }
    }
}

impl std::fmt::Debug for PortableRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortableRecord")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_time(text: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    timestamp::parse(text).map_err(|e| Error::Validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_record_fills_defaults() {
        let portable: PortableRecord =
            serde_json::from_str(r#"{"title":"Mail","password":"pw"}"#).unwrap();
        let record = portable.into_record().unwrap();

        assert_eq!(record.title, "Mail");
        assert_eq!(record.username, "");
        assert_eq!(record.category, Category::Login);
        assert!(record.last_used.is_none());
    }

    #[test]
    fn test_keeps_id_and_timestamps() {
        let json = r#"{"id":"6f1c1d2e-0b9a-4c55-9e4a-3b1f0a9d2c11",
            "title":"Mail","password":"pw","category":"NOTE",
            "createdAt":"2023-05-01T10:00:00Z","updatedAt":"2023-06-01T10:00:00.250Z"}"#;
        let record = serde_json::from_str::<PortableRecord>(json)
            .unwrap()
            .into_record()
            .unwrap();

        assert_eq!(record.id.to_string(), "6f1c1d2e-0b9a-4c55-9e4a-3b1f0a9d2c11");
        assert_eq!(record.category, Category::Note);
        assert_eq!(timestamp::format(&record.created_at), "2023-05-01T10:00:00.000Z");
        assert_eq!(timestamp::format(&record.updated_at), "2023-06-01T10:00:00.250Z");
    }

    #[test]
    fn test_invalid_inputs() {
        let no_title = PortableRecord {
            password: "pw".into(),
            ..PortableRecord::default()
        };
        assert!(no_title.into_record().is_err());

        let bad_category = PortableRecord {
            title: "t".into(),
            password: "pw".into(),
            category: Some("spaceship".into()),
            ..PortableRecord::default()
        };
        assert!(bad_category.into_record().is_err());

        let bad_time = PortableRecord {
            title: "t".into(),
            password: "pw".into(),
            created_at: Some("last tuesday".into()),
            ..PortableRecord::default()
        };
        assert!(matches!(bad_time.into_record(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_from_record_roundtrip() {
        let original =
            VaultRecord::from_draft(RecordDraft::new("Bank", "me", "pw")).unwrap();
        let restored = PortableRecord::from(&original).into_record().unwrap();
        assert_eq!(restored, original);
    }
}
