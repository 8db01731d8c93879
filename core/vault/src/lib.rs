//! Vault engine for lockbox.
//!
//! This module provides:
//! - The encrypted envelope format and its codec
//! - Canonical serialization of the plaintext vault
//! - The in-memory record store (CRUD, search, statistics, import)
//! - Plaintext JSON and CSV export
//!
//! # Architecture
//! Records live in a [`RecordStore`]. Sealing serializes them with
//! [`serializer`] and hands the bytes to an [`EnvelopeCodec`]; opening runs
//! the same steps in reverse. Reading and writing the resulting text is left
//! to the host.

pub mod csv;
pub mod envelope;
pub mod export;
pub mod portable;
pub mod record;
pub mod serializer;
pub mod store;
pub mod timestamp;

pub use envelope::{
    is_encrypted_envelope, ChecksumStatus, EncryptedEnvelope, EnvelopeCodec, EnvelopeMetadata,
    OpenedEnvelope, SealInfo, CURRENT_VERSION, SUPPORTED_VERSIONS,
};
pub use export::{Export, ExportFormat, PlainExport, PlainFormat};
pub use portable::PortableRecord;
pub use record::{Category, RecordDraft, RecordUpdate, VaultData, VaultRecord};
pub use serializer::{from_canonical_bytes, to_canonical_bytes};
pub use store::{ImportMode, ImportReport, ImportSource, RecordStore, SearchFilter, VaultStats};
