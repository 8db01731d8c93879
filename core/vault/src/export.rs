//! Export modes.
//!
//! Plaintext exports and encrypted envelopes are different types. Code that
//! holds an [`Export`] always knows which one it has.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::envelope::EncryptedEnvelope;
use crate::portable::PortableRecord;
use crate::record::{VaultData, VaultRecord};
use lockbox_common::{Error, Result};

/// Plaintext export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlainFormat {
    Json,
    Csv,
}

/// Export target chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Encrypted,
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "encrypted" | "envelope" => Ok(ExportFormat::Encrypted),
            other => Err(Error::InvalidInput(format!(
                "Unknown format '{}'. Use: json, csv, or encrypted",
                other
            ))),
        }
    }
}

/// Unencrypted export. Contains every password in clear text.
#[derive(Clone, PartialEq, Eq)]
pub struct PlainExport {
    format: PlainFormat,
    contents: String,
}

impl PlainExport {
    pub fn format(&self) -> PlainFormat {
        self.format
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn into_contents(self) -> String {
        self.contents
    }
}

impl fmt::Debug for PlainExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlainExport({:?}, [REDACTED; {} bytes])", self.format, self.contents.len())
    }
}

/// Result of exporting a vault.
#[derive(Debug, Clone)]
pub enum Export {
    Plain(PlainExport),
    Encrypted(EncryptedEnvelope),
}

impl Export {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Export::Encrypted(_))
    }

    /// Text to hand to storage.
    pub fn to_text(&self) -> Result<String> {
        match self {
            Export::Plain(plain) => Ok(plain.contents.clone()),
            Export::Encrypted(envelope) => envelope.to_json(),
        }
    }
}

/// Pretty JSON of the full vault document.
pub fn export_json(data: &VaultData) -> Result<PlainExport> {
    Ok(PlainExport {
        format: PlainFormat::Json,
        contents: serde_json::to_string_pretty(data)?,
    })
}

/// CSV of the records.
pub fn export_csv(records: &[VaultRecord]) -> PlainExport {
    PlainExport {
        format: PlainFormat::Csv,
        contents: crate::csv::write_records(records),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonImport {
    Records(Vec<PortableRecord>),
    Vault { entries: Vec<PortableRecord> },
}

/// Parse a JSON export: a full vault object or a bare array of records.
///
/// # Errors
/// - [`Error::InvalidInput`] if the text is neither shape
pub fn parse_json(text: &str) -> Result<Vec<PortableRecord>> {
    let parsed: JsonImport = serde_json::from_str(text).map_err(|_| {
        Error::InvalidInput("Expected a vault object or an array of records".to_string())
    })?;
    Ok(match parsed {
        JsonImport::Records(records) => records,
        JsonImport::Vault { entries } => entries,
    })
}
