//! The record of which words already have an image.
//!
//! A word id present in the ledger is the only "done" signal. The file is
//! rewritten in full after every new record, through a temporary file that
//! replaces the old ledger atomically. The rewrite runs on tokio's blocking
//! pool because `tempfile` only offers a synchronous API.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::LedgerError;

/// One successfully generated image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// The source word
    pub word: String,
    /// The word's category
    pub category: String,
    /// Local path of the saved image
    pub path: String,
    /// Public CDN URL, when the image was uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_url: Option<String>,
    /// When the image was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

/// Word id -> record, backed by a JSON file.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    records: BTreeMap<String, GenerationRecord>,
}

impl Ledger {
    /// Loads the ledger; a missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let records = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(LedgerError::Io(err)),
        };
        Ok(Self { path, records })
    }

    /// Where the ledger lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the word id already has an image.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// The record for a word id.
    pub fn get(&self, id: &str) -> Option<&GenerationRecord> {
        self.records.get(id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been generated yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Adds a record and rewrites the file.
    ///
    /// If the rewrite fails the record is dropped again, so the in-memory
    /// ledger never claims more than the file does.
    pub async fn record(&mut self, id: &str, record: GenerationRecord) -> Result<(), LedgerError> {
        let previous = self.records.insert(id.to_string(), record);
        if let Err(err) = self.save().await {
            match previous {
                Some(previous) => self.records.insert(id.to_string(), previous),
                None => self.records.remove(id),
            };
            return Err(err);
        }
        Ok(())
    }

    /// Writes the whole ledger to disk atomically.
    pub async fn save(&self) -> Result<(), LedgerError> {
        let path = self.path.clone();
        let records = self.records.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &records)).await?
    }
}

fn write_atomically(
    path: &Path,
    records: &BTreeMap<String, GenerationRecord>,
) -> Result<(), LedgerError> {
    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file());
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    temp_file.as_file().sync_all()?;
    temp_file.persist(path)?;
    debug!("Ledger saved ({} records)", records.len());
    Ok(())
}
