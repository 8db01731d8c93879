//! Credential records and the vault document that holds them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timestamp;
use lockbox_common::{Error, Result};

/// Maximum title length in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Version of the plaintext vault document.
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// Record category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Login,
    Card,
    Note,
    Identity,
    Wifi,
    Other,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 6] = [
        Category::Login,
        Category::Card,
        Category::Note,
        Category::Identity,
        Category::Wifi,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Login => "login",
            Category::Card => "card",
            Category::Note => "note",
            Category::Identity => "identity",
            Category::Wifi => "wifi",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| Error::Validation(format!("Unknown category '{}'", s.trim())))
    }
}

/// Input for creating a record.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub category: Category,
    pub favorite: bool,
    pub custom_fields: BTreeMap<String, String>,
}

impl RecordDraft {
    pub fn new(
        title: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for RecordDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordDraft")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Partial update. `None` leaves a field untouched; an empty `url` or
/// `notes` clears it.
#[derive(Clone, Default)]
pub struct RecordUpdate {
    pub title: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<Category>,
    pub favorite: Option<bool>,
    pub custom_fields: Option<BTreeMap<String, String>>,
}

/// A stored credential.
///
/// Field order here is the field order of the canonical serialization.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRecord {
    pub id: Uuid,
    pub title: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    #[serde(with = "timestamp::canonical")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::canonical")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        with = "timestamp::canonical_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_used: Option<DateTime<Utc>>,
}

impl VaultRecord {
    /// Build a validated record from a draft.
    pub fn from_draft(draft: RecordDraft) -> Result<Self> {
        let now = timestamp::now();
        let record = Self {
            id: Uuid::new_v4(),
            title: draft.title.trim().to_string(),
            username: draft.username,
            password: draft.password,
            url: non_empty(draft.url),
            notes: non_empty(draft.notes),
            tags: normalize_tags(draft.tags),
            category: draft.category,
            favorite: draft.favorite,
            custom_fields: draft.custom_fields,
            created_at: now,
            updated_at: now,
            last_used: None,
        };
        record.validate()?;
        Ok(record)
    }

    /// Check the record rules.
    pub fn validate(&self) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Title is required".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(Error::Validation(format!(
                "Title must be at most {} characters",
                MAX_TITLE_LENGTH
            )));
        }
        if self.password.is_empty() {
            return Err(Error::Validation("Password is required".to_string()));
        }
        if let Some(url) = &self.url {
            let lower = url.to_ascii_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                return Err(Error::Validation(format!(
                    "URL must start with http:// or https://: {}",
                    url
                )));
            }
        }
        Ok(())
    }

    /// Apply a patch and bump `updated_at`. The record is left untouched if
    /// the patched version fails validation.
    pub fn apply(&mut self, update: RecordUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(title) = update.title {
            next.title = title.trim().to_string();
        }
        if let Some(username) = update.username {
            next.username = username;
        }
        if let Some(password) = update.password {
            next.password = password;
        }
        if let Some(url) = update.url {
            next.url = non_empty(Some(url));
        }
        if let Some(notes) = update.notes {
            next.notes = non_empty(Some(notes));
        }
        if let Some(tags) = update.tags {
            next.tags = normalize_tags(tags);
        }
        if let Some(category) = update.category {
            next.category = category;
        }
        if let Some(favorite) = update.favorite {
            next.favorite = favorite;
        }
        if let Some(fields) = update.custom_fields {
            next.custom_fields = fields;
        }
        next.validate()?;
        next.updated_at = timestamp::now();
        *self = next;
        Ok(())
    }

    /// Key used to detect the same credential arriving twice on import.
    pub fn identity_key(&self) -> (String, String, String) {
        (
            self.title.trim().to_lowercase(),
            self.username.trim().to_lowercase(),
            self.url.clone().unwrap_or_default().trim().to_lowercase(),
        )
    }
}

impl fmt::Debug for VaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultRecord")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .field("tags", &self.tags)
            .field("category", &self.category)
            .field("favorite", &self.favorite)
            .finish_non_exhaustive()
    }
}

/// The plaintext vault document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultData {
    pub version: String,
    pub name: String,
    #[serde(with = "timestamp::canonical")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::canonical")]
    pub last_modified: DateTime<Utc>,
    pub entries: Vec<VaultRecord>,
}

impl VaultData {
    /// Create an empty vault document.
    pub fn new(name: impl Into<String>) -> Self {
        let now = timestamp::now();
        Self {
            version: DOCUMENT_VERSION.to_string(),
            name: name.into(),
            created_at: now,
            last_modified: now,
            entries: Vec::new(),
        }
    }
}

/// Trim, drop empties and de-duplicate while keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !result.iter().any(|t| t == tag) {
            result.push(tag.to_string());
        }
    }
    result
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_draft_normalizes() {
        let mut draft = RecordDraft::new("  Email  ", "me@example.com", "s3cret!");
        draft.tags = vec![" work ".into(), "".into(), "work".into(), "mail".into()];
        draft.url = Some("   ".into());

        let record = VaultRecord::from_draft(draft).unwrap();
        assert_eq!(record.title, "Email");
        assert_eq!(record.tags, vec!["work", "mail"]);
        assert_eq!(record.url, None);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_validation_rules() {
        assert!(VaultRecord::from_draft(RecordDraft::new(" ", "u", "p")).is_err());
        assert!(VaultRecord::from_draft(RecordDraft::new("t", "u", "")).is_err());
        assert!(VaultRecord::from_draft(RecordDraft::new("x".repeat(201), "u", "p")).is_err());

        let mut draft = RecordDraft::new("t", "u", "p");
        draft.url = Some("ftp://example.com".into());
        assert!(matches!(
            VaultRecord::from_draft(draft),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_apply_rejects_invalid_patch_without_mutation() {
        let mut record = VaultRecord::from_draft(RecordDraft::new("Bank", "me", "pw")).unwrap();
        let before = record.clone();

        let result = record.apply(RecordUpdate {
            password: Some(String::new()),
            ..RecordUpdate::default()
        });

        assert!(result.is_err());
        assert_eq!(record, before);
    }

    #[test]
    fn test_apply_clears_url_with_empty_string() {
        let mut draft = RecordDraft::new("Site", "me", "pw");
        draft.url = Some("https://example.com".into());
        let mut record = VaultRecord::from_draft(draft).unwrap();

        record
            .apply(RecordUpdate {
                url: Some(String::new()),
                favorite: Some(true),
                ..RecordUpdate::default()
            })
            .unwrap();

        assert_eq!(record.url, None);
        assert!(record.favorite);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("WiFi".parse::<Category>().unwrap(), Category::Wifi);
        assert!("bogus".parse::<Category>().is_err());
        assert_eq!(Category::default(), Category::Login);
    }

    #[test]
    fn test_debug_redacts_password() {
        let record = VaultRecord::from_draft(RecordDraft::new("t", "u", "hunter2")).unwrap();
        assert!(!format!("{:?}", record).contains("hunter2"));
        assert!(!format!("{:?}", RecordDraft::new("t", "u", "hunter2")).contains("hunter2"));
    }
}
