//! lockbox CLI - Command line interface for password vault files.
//!
//! A vault file is a single encrypted envelope (JSON). Every command that
//! touches records decrypts the file, works on the records in memory and
//! writes a freshly sealed envelope back.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;
use zeroize::Zeroizing;

use lockbox_crypto::KdfParams;
use lockbox_vault::{
    ChecksumStatus, EncryptedEnvelope, EnvelopeCodec, Export, ExportFormat, ImportMode,
    ImportSource, RecordDraft, RecordStore, SearchFilter,
};

#[derive(Parser)]
#[command(name = "lockbox")]
#[command(about = "lockbox - Encrypted password vault")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty vault file.
    Init {
        /// Vault name.
        #[arg(short, long)]
        name: String,

        /// Vault file to create.
        #[arg(short, long)]
        file: PathBuf,

        /// KDF strength: "interactive", "moderate", or "sensitive".
        #[arg(short, long, default_value = "interactive")]
        strength: String,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Add a credential. The entry password is prompted for.
    Add {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        username: String,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// login, card, note, identity, wifi or other.
        #[arg(short, long, default_value = "login")]
        category: String,

        /// Comma-separated tags.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(long)]
        favorite: bool,
    },

    /// List or search credentials.
    List {
        #[arg(short, long)]
        file: PathBuf,

        /// Text to search for.
        #[arg(short, long)]
        query: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        /// Required tag; repeat for several.
        #[arg(short, long)]
        tag: Vec<String>,

        /// Only favorites.
        #[arg(long)]
        favorites: bool,
    },

    /// Remove a credential by id.
    Remove {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        id: Uuid,
    },

    /// Show vault statistics.
    Stats {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Export the vault.
    Export {
        #[arg(short, long)]
        file: PathBuf,

        /// Output file.
        #[arg(short, long)]
        out: PathBuf,

        /// json, csv, or encrypted.
        #[arg(long, default_value = "encrypted")]
        format: String,
    },

    /// Import credentials into the vault.
    Import {
        #[arg(short, long)]
        file: PathBuf,

        /// File to import from.
        #[arg(short, long)]
        source: PathBuf,

        /// json, csv, or encrypted.
        #[arg(long, default_value = "json")]
        format: String,

        /// Replace existing records instead of merging.
        #[arg(long)]
        replace: bool,
    },

    /// Show envelope metadata without decrypting.
    Info {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Change the master password.
    ChangePassword {
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init {
            name,
            file,
            strength,
            force,
        } => cmd_init(&name, &file, &strength, force).await,

        Commands::Add {
            file,
            title,
            username,
            url,
            notes,
            category,
            tags,
            favorite,
        } => {
            let mut draft = RecordDraft::new(title, username, String::new());
            draft.url = url;
            draft.notes = notes;
            draft.category = category.parse()?;
            draft.tags = tags;
            draft.favorite = favorite;
            cmd_add(&file, draft).await
        }

        Commands::List {
            file,
            query,
            category,
            tag,
            favorites,
        } => {
            let filter = SearchFilter {
                query,
                category: category.map(|c| c.parse()).transpose()?,
                tags: tag,
                favorites_only: favorites,
            };
            cmd_list(&file, &filter).await
        }

        Commands::Remove { file, id } => cmd_remove(&file, id).await,

        Commands::Stats { file } => cmd_stats(&file).await,

        Commands::Export { file, out, format } => cmd_export(&file, &out, &format).await,

        Commands::Import {
            file,
            source,
            format,
            replace,
        } => cmd_import(&file, &source, &format, replace).await,

        Commands::Info { file } => cmd_info(&file).await,

        Commands::ChangePassword { file } => cmd_change_password(&file).await,
    }
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Prompt twice and insist on a non-empty, matching password.
fn prompt_new_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = prompt_password(prompt)?;
    let confirm = prompt_password("Confirm password: ")?;

    if password != confirm {
        bail!("Passwords do not match");
    }
    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}

/// Read the envelope stored at `path`.
async fn read_envelope(path: &Path) -> Result<EncryptedEnvelope> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    EncryptedEnvelope::from_json(&text).context("File is not a lockbox vault")
}

/// Codec that reseals with the same KDF profile the envelope was sealed with.
fn codec_for(envelope: &EncryptedEnvelope) -> EnvelopeCodec {
    EnvelopeCodec::with_params(envelope.kdf.unwrap_or_default())
}

/// Decrypt a vault file. Key derivation runs on the blocking pool.
async fn open_vault(
    path: &Path,
    password: Zeroizing<String>,
) -> Result<(RecordStore, EnvelopeCodec)> {
    let envelope = read_envelope(path).await?;
    let codec = codec_for(&envelope);

    let worker_codec = codec.clone();
    let (store, checksum) = tokio::task::spawn_blocking(move || {
        RecordStore::open(&worker_codec, &envelope, Some(password.as_str()))
    })
    .await?
    .context("Failed to open vault")?;

    if let ChecksumStatus::Mismatch { expected, actual } = checksum {
        warn!(%expected, %actual, "Vault checksum mismatch; contents decrypted but may be damaged");
    }

    Ok((store, codec))
}

/// Seal a store and write it to `path`.
async fn save_vault(
    path: &Path,
    store: &RecordStore,
    codec: &EnvelopeCodec,
    password: Zeroizing<String>,
) -> Result<()> {
    let store = store.clone();
    let codec = codec.clone();
    let envelope = tokio::task::spawn_blocking(move || store.seal(&codec, Some(password.as_str())))
        .await?
        .context("Failed to seal vault")?;

    write_text(path, &envelope.to_json()?).await
}

async fn write_text(path: &Path, text: &str) -> Result<()> {
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Create a new vault.
async fn cmd_init(name: &str, file: &Path, strength: &str, force: bool) -> Result<()> {
    info!("Creating new vault: {}", name);

    let kdf_params = KdfParams::from_profile(strength)?;
    if file.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", file.display());
    }

    let password = prompt_new_password("Enter master password: ")?;
    let codec = EnvelopeCodec::with_params(kdf_params);
    let store = RecordStore::new(name);
    save_vault(file, &store, &codec, password).await?;

    println!("Vault created successfully!");
    println!("  Name: {}", name);
    println!("  Location: {}", file.display());
    println!("  KDF: {}", strength);

    Ok(())
}

async fn cmd_add(file: &Path, mut draft: RecordDraft) -> Result<()> {
    let password = prompt_password("Master password: ")?;
    let (mut store, codec) = open_vault(file, password.clone()).await?;

    draft.password = prompt_password(&format!("Password for '{}': ", draft.title))?.to_string();
    let id = store.create(draft)?.id;
    save_vault(file, &store, &codec, password).await?;

    println!("Added {}", id);
    Ok(())
}

async fn cmd_list(file: &Path, filter: &SearchFilter) -> Result<()> {
    let password = prompt_password("Master password: ")?;
    let (store, _) = open_vault(file, password).await?;

    let hits = store.search(filter);
    if hits.is_empty() {
        println!("No matching entries.");
        return Ok(());
    }

    for record in hits {
        let star = if record.favorite { "*" } else { " " };
        println!(
            "{} {}  {:<30} {:<24} [{}] {}",
            star,
            record.id,
            record.title,
            record.username,
            record.category,
            record.tags.join(", ")
        );
    }
    Ok(())
}

async fn cmd_remove(file: &Path, id: Uuid) -> Result<()> {
    let password = prompt_password("Master password: ")?;
    let (mut store, codec) = open_vault(file, password.clone()).await?;

    let removed = store.delete(id)?;
    save_vault(file, &store, &codec, password).await?;

    println!("Removed '{}'", removed.title);
    Ok(())
}

async fn cmd_stats(file: &Path) -> Result<()> {
    let password = prompt_password("Master password: ")?;
    let (store, _) = open_vault(file, password).await?;
    let stats = store.stats();

    println!("Vault: {}", store.name());
    println!("  Entries: {}", stats.total);
    println!("  Favorites: {}", stats.favorites);
    for (category, count) in &stats.by_category {
        println!("  {}: {}", category, count);
    }
    println!("  Weak passwords: {}", stats.weak_passwords);
    println!("  Reused passwords: {}", stats.reused_passwords);
    if let Some(newest) = stats.newest_update {
        println!("  Last change: {}", newest.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

async fn cmd_export(file: &Path, out: &Path, format: &str) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    let password = prompt_password("Master password: ")?;
    let (store, codec) = open_vault(file, password.clone()).await?;

    let export = tokio::task::spawn_blocking(move || {
        store.export(format, &codec, Some(password.as_str()))
    })
    .await??;

    if let Export::Plain(_) = &export {
        warn!("Writing an UNENCRYPTED export; every password is readable in {}", out.display());
    }
    write_text(out, &export.to_text()?).await?;

    println!("Exported to {}", out.display());
    Ok(())
}

async fn cmd_import(file: &Path, source: &Path, format: &str, replace: bool) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    let text = tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("Failed to read {}", source.display()))?;

    let password = prompt_password("Master password: ")?;
    let (mut store, codec) = open_vault(file, password.clone()).await?;
    let mode = if replace {
        ImportMode::Replace
    } else {
        ImportMode::Merge
    };

    let report = match format {
        ExportFormat::Json => store.import(ImportSource::Json(&text), mode, &codec)?,
        ExportFormat::Csv => store.import(ImportSource::Csv(&text), mode, &codec)?,
        ExportFormat::Encrypted => {
            let envelope = EncryptedEnvelope::from_json(&text)?;
            let source_password = prompt_password("Password of the imported vault: ")?;
            let source_codec = codec_for(&envelope);
            let (updated, report) = tokio::task::spawn_blocking(move || {
                let source = ImportSource::Encrypted {
                    envelope: &envelope,
                    password: Some(source_password.as_str()),
                };
                let report = store.import(source, mode, &source_codec)?;
                Ok::<_, lockbox_common::Error>((store, report))
            })
            .await??;
            store = updated;
            report
        }
    };

    save_vault(file, &store, &codec, password).await?;

    println!(
        "Imported {} entries ({} duplicates skipped, {} invalid)",
        report.imported,
        report.duplicates,
        report.invalid.len()
    );
    for problem in &report.invalid {
        println!("  {}", problem);
    }
    Ok(())
}

async fn cmd_info(file: &Path) -> Result<()> {
    let envelope = read_envelope(file).await?;

    println!("Format version: {}", envelope.version);
    if let Some(kdf) = &envelope.kdf {
        println!(
            "KDF: Argon2id (memory {} KiB, iterations {}, parallelism {})",
            kdf.memory_cost, kdf.time_cost, kdf.parallelism
        );
    }
    match &envelope.metadata {
        Some(meta) => {
            println!("Name: {}", meta.name);
            println!("Entries: {}", meta.entry_count);
            println!("Created: {}", meta.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("Modified: {}", meta.last_modified.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        None => println!("No metadata recorded."),
    }
    Ok(())
}

async fn cmd_change_password(file: &Path) -> Result<()> {
    let envelope = read_envelope(file).await?;
    let old_password = prompt_password("Current password: ")?;
    let new_password = prompt_new_password("New password: ")?;

    let codec = codec_for(&envelope);
    let rekeyed = tokio::task::spawn_blocking(move || {
        codec.rekey(
            &envelope,
            Some(old_password.as_str()),
            Some(new_password.as_str()),
        )
    })
    .await?
    .context("Failed to change password")?;

    write_text(file, &rekeyed.to_json()?).await?;
    println!("Password changed successfully!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_codec() -> EnvelopeCodec {
        EnvelopeCodec::with_params(KdfParams::new(1024, 1, 1))
    }

    fn password(text: &str) -> Zeroizing<String> {
        Zeroizing::new(text.to_string())
    }

    #[tokio::test]
    async fn test_save_and_open_vault_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");

        let mut store = RecordStore::new("Personal");
        store
            .create(RecordDraft::new("Mail", "me", "Sup3r-Secret!"))
            .unwrap();
        save_vault(&path, &store, &cheap_codec(), password("master"))
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(lockbox_vault::is_encrypted_envelope(&text));
        assert!(!text.contains("Sup3r-Secret!"));

        let (opened, codec) = open_vault(&path, password("master")).await.unwrap();
        assert_eq!(opened.data(), store.data());
        // The KDF profile recorded in the file is reused for resealing
        assert_eq!(codec.params(), &KdfParams::new(1024, 1, 1));

        assert!(open_vault(&path, password("wrong")).await.is_err());
    }

    #[tokio::test]
    async fn test_read_envelope_rejects_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.json");
        std::fs::write(&path, "[{\"title\":\"x\",\"password\":\"y\"}]").unwrap();

        assert!(read_envelope(&path).await.is_err());
        assert!(read_envelope(&dir.path().join("missing.json")).await.is_err());
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from([
            "lockbox", "list", "--file", "v.json", "--tag", "work", "--tag", "mail", "--favorites",
        ])
        .unwrap();
        match cli.command {
            Commands::List { tag, favorites, .. } => {
                assert_eq!(tag, vec!["work", "mail"]);
                assert!(favorites);
            }
            _ => panic!("expected list"),
        }

        let cli = Cli::try_parse_from([
            "lockbox", "add", "--file", "v.json", "--title", "Mail", "--tags", "a,b",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Add { ref tags, .. } if tags.len() == 2));
    }
}
