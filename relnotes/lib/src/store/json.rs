//! Atomic JSON persistence helpers and the file-backed [`SummaryStore`].

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{StoreError, SummaryStore};
use crate::types::ReleaseNotesSummary;

/// Writes `value` as pretty-printed JSON.
///
/// Uses atomic write (temp file + rename) so an interrupted run never leaves
/// a truncated file behind.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Reads JSON from `path`, or `None` if the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path)?;
    let value = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(value))
}

/// Summary store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SummaryStore for JsonFileStore {
    fn load(&self) -> Result<Option<ReleaseNotesSummary>, StoreError> {
        read_json(&self.path)
    }

    fn save(&self, summary: &ReleaseNotesSummary) -> Result<(), StoreError> {
        write_json_atomic(&self.path, summary)
    }
}
