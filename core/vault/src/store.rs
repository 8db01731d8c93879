//! In-memory record collection.
//!
//! [`RecordStore`] owns the decrypted [`VaultData`] and provides CRUD,
//! search, statistics and import. Sealing runs the serializer and then the
//! envelope codec; opening runs them in reverse.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::envelope::{ChecksumStatus, EncryptedEnvelope, EnvelopeCodec, SealInfo};
use crate::export::{export_csv, export_json, parse_json, Export, ExportFormat};
use crate::portable::PortableRecord;
use crate::record::{Category, RecordDraft, RecordUpdate, VaultData, VaultRecord};
use crate::serializer::{from_canonical_bytes, to_canonical_bytes};
use crate::timestamp;
use lockbox_common::{Error, Result};

/// Passwords shorter than this count as weak.
pub const MIN_STRONG_PASSWORD_LENGTH: usize = 12;

/// Search criteria. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Case-insensitive substring over title, username, url, notes and tags.
    pub query: Option<String>,
    pub category: Option<Category>,
    /// Record must carry every one of these tags.
    pub tags: Vec<String>,
    pub favorites_only: bool,
}

impl SearchFilter {
    fn matches(&self, record: &VaultRecord) -> bool {
        if self.favorites_only && !record.favorite {
            return false;
        }
        if self.category.is_some_and(|c| c != record.category) {
            return false;
        }
        if !self.tags.iter().all(|wanted| {
            record
                .tags
                .iter()
                .any(|t| t.eq_ignore_ascii_case(wanted.trim()))
        }) {
            return false;
        }

        match self.query.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(query) => {
                let query = query.to_lowercase();
                let hit = |text: &str| text.to_lowercase().contains(&query);
                hit(&record.title)
                    || hit(&record.username)
                    || record.url.as_deref().is_some_and(hit)
                    || record.notes.as_deref().is_some_and(hit)
                    || record.tags.iter().any(|t| hit(t))
            }
        }
    }
}

/// Aggregate numbers over the collection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VaultStats {
    pub total: usize,
    pub favorites: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub weak_passwords: usize,
    /// Records whose password is shared with at least one other record.
    pub reused_passwords: usize,
    pub oldest_update: Option<DateTime<Utc>>,
    pub newest_update: Option<DateTime<Utc>>,
}

/// How imported records combine with existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Keep existing records; skip incoming duplicates.
    #[default]
    Merge,
    /// Discard existing records first.
    Replace,
}

/// Where imported records come from.
pub enum ImportSource<'a> {
    Json(&'a str),
    Csv(&'a str),
    Encrypted {
        envelope: &'a EncryptedEnvelope,
        password: Option<&'a str>,
    },
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub duplicates: usize,
    /// One message per rejected record.
    pub invalid: Vec<String>,
}

/// Whether a password is weak: too short or fewer than three of
/// lowercase, uppercase, digits and symbols.
pub fn is_weak_password(password: &str) -> bool {
    let classes = [
        password.chars().any(|c| c.is_lowercase()),
        password.chars().any(|c| c.is_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_alphanumeric()),
    ]
    .into_iter()
    .filter(|present| *present)
    .count();

    password.chars().count() < MIN_STRONG_PASSWORD_LENGTH || classes < 3
}

/// Owner of the decrypted record collection.
#[derive(Debug, Clone)]
pub struct RecordStore {
    data: VaultData,
}

impl RecordStore {
    /// Start an empty vault.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            data: VaultData::new(name),
        }
    }

    /// Wrap an existing document.
    pub fn from_data(data: VaultData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &VaultData {
        &self.data
    }

    pub fn into_data(self) -> VaultData {
        self.data
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn len(&self) -> usize {
        self.data.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.entries.is_empty()
    }

    /// All records in insertion order.
    pub fn list(&self) -> &[VaultRecord] {
        &self.data.entries
    }

    pub fn get(&self, id: Uuid) -> Option<&VaultRecord> {
        self.data.entries.iter().find(|r| r.id == id)
    }

    /// Validate and add a record.
    pub fn create(&mut self, draft: RecordDraft) -> Result<&VaultRecord> {
        let record = VaultRecord::from_draft(draft)?;
        debug!(id = %record.id, category = %record.category, "Record created");
        self.data.entries.push(record);
        self.touch_vault();
        let last = self.data.entries.len() - 1;
        Ok(&self.data.entries[last])
    }

    /// Patch a record.
    pub fn update(&mut self, id: Uuid, update: RecordUpdate) -> Result<&VaultRecord> {
        let idx = self.position(id)?;
        self.data.entries[idx].apply(update)?;
        self.touch_vault();
        debug!(id = %id, "Record updated");
        Ok(&self.data.entries[idx])
    }

    /// Remove a record and return it.
    pub fn delete(&mut self, id: Uuid) -> Result<VaultRecord> {
        let idx = self.position(id)?;
        let removed = self.data.entries.remove(idx);
        self.touch_vault();
        debug!(id = %id, "Record deleted");
        Ok(removed)
    }

    /// Flip the favorite flag, returning the new value.
    pub fn toggle_favorite(&mut self, id: Uuid) -> Result<bool> {
        let idx = self.position(id)?;
        let favorite = !self.data.entries[idx].favorite;
        self.data.entries[idx].apply(RecordUpdate {
            favorite: Some(favorite),
            ..RecordUpdate::default()
        })?;
        self.touch_vault();
        Ok(favorite)
    }

    /// Record that a credential was used.
    pub fn touch(&mut self, id: Uuid) -> Result<()> {
        let idx = self.position(id)?;
        self.data.entries[idx].last_used = Some(timestamp::now());
        Ok(())
    }

    /// Matching records, favorites first, then by title.
    pub fn search(&self, filter: &SearchFilter) -> Vec<&VaultRecord> {
        let mut hits: Vec<&VaultRecord> = self
            .data
            .entries
            .iter()
            .filter(|r| filter.matches(r))
            .collect();
        hits.sort_by(|a, b| {
            b.favorite
                .cmp(&a.favorite)
                .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        });
        hits
    }

    pub fn stats(&self) -> VaultStats {
        let entries = &self.data.entries;

        let mut by_category = BTreeMap::new();
        let mut password_counts: HashMap<&str, usize> = HashMap::new();
        for record in entries {
            *by_category.entry(record.category).or_insert(0) += 1;
            *password_counts.entry(record.password.as_str()).or_insert(0) += 1;
        }

        VaultStats {
            total: entries.len(),
            favorites: entries.iter().filter(|r| r.favorite).count(),
            by_category,
            weak_passwords: entries.iter().filter(|r| is_weak_password(&r.password)).count(),
            reused_passwords: entries
                .iter()
                .filter(|r| password_counts[r.password.as_str()] > 1)
                .count(),
            oldest_update: entries.iter().map(|r| r.updated_at).min(),
            newest_update: entries.iter().map(|r| r.updated_at).max(),
        }
    }

    /// Serialize and encrypt the whole vault.
    pub fn seal(&self, codec: &EnvelopeCodec, password: Option<&str>) -> Result<EncryptedEnvelope> {
        let plaintext = zeroize::Zeroizing::new(to_canonical_bytes(&self.data)?);
        let info = SealInfo {
            name: self.data.name.clone(),
            entry_count: self.data.entries.len() as u64,
            created_at: Some(self.data.created_at),
        };
        let envelope = codec.seal(&plaintext, password, info)?;
        info!(entries = self.len(), "Vault sealed");
        Ok(envelope)
    }

    /// Decrypt and parse a sealed vault.
    ///
    /// The checksum status is returned alongside; a mismatch has already
    /// been logged but does not fail the call.
    pub fn open(
        codec: &EnvelopeCodec,
        envelope: &EncryptedEnvelope,
        password: Option<&str>,
    ) -> Result<(Self, ChecksumStatus)> {
        let opened = codec.open(envelope, password)?;
        let data = from_canonical_bytes(opened.plaintext.as_bytes())?;

        if let Some(meta) = &opened.metadata {
            if meta.entry_count != data.entries.len() as u64 {
                warn!(
                    recorded = meta.entry_count,
                    actual = data.entries.len(),
                    "Envelope entry count differs from contents"
                );
            }
        }

        info!(entries = data.entries.len(), "Vault opened");
        Ok((Self { data }, opened.checksum))
    }

    /// Export in the requested format. Encrypted export needs a password.
    pub fn export(
        &self,
        format: ExportFormat,
        codec: &EnvelopeCodec,
        password: Option<&str>,
    ) -> Result<Export> {
        let export = match format {
            ExportFormat::Json => Export::Plain(export_json(&self.data)?),
            ExportFormat::Csv => Export::Plain(export_csv(&self.data.entries)),
            ExportFormat::Encrypted => Export::Encrypted(self.seal(codec, password)?),
        };
        info!(format = ?format, entries = self.len(), "Vault exported");
        Ok(export)
    }

    /// Import records from a plaintext export or another sealed vault.
    pub fn import(
        &mut self,
        source: ImportSource<'_>,
        mode: ImportMode,
        codec: &EnvelopeCodec,
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        let incoming: Vec<VaultRecord> = match source {
            ImportSource::Json(text) => collect_valid(parse_json(text)?, &mut report),
            ImportSource::Csv(text) => collect_valid(crate::csv::parse_records(text)?, &mut report),
            ImportSource::Encrypted { envelope, password } => {
                let (other, _) = Self::open(codec, envelope, password)?;
                other.data.entries
            }
        };

        if mode == ImportMode::Replace {
            self.data.entries.clear();
        }

        let mut seen: HashSet<(String, String, String)> =
            self.data.entries.iter().map(|r| r.identity_key()).collect();
        let mut ids: HashSet<Uuid> = self.data.entries.iter().map(|r| r.id).collect();

        for mut record in incoming {
            if !seen.insert(record.identity_key()) {
                report.duplicates += 1;
                continue;
            }
            if !ids.insert(record.id) {
                record.id = Uuid::new_v4();
                ids.insert(record.id);
            }
            self.data.entries.push(record);
            report.imported += 1;
        }

        self.touch_vault();
        info!(
            imported = report.imported,
            duplicates = report.duplicates,
            invalid = report.invalid.len(),
            "Import finished"
        );
        Ok(report)
    }

    fn position(&self, id: Uuid) -> Result<usize> {
        self.data
            .entries
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("Record {}", id)))
    }

    fn touch_vault(&mut self) {
        self.data.last_modified = timestamp::now();
    }
}

fn collect_valid(records: Vec<PortableRecord>, report: &mut ImportReport) -> Vec<VaultRecord> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(idx, portable)| match portable.into_record() {
            Ok(record) => Some(record),
            Err(e) => {
                report.invalid.push(format!("Record {}: {}", idx + 1, e));
                None
            }
        })
        .collect()
}
