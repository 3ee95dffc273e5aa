//! Persistence seams for the pipeline.
//!
//! - [`DocumentStore`]: key → raw document blob, keyed by version string or
//!   the [`INDEX_KEY`](crate::types::INDEX_KEY) sentinel.
//! - [`SummaryStore`]: load/save of the final [`ReleaseNotesSummary`].
//!
//! Both have filesystem implementations ([`FsDocumentStore`],
//! [`JsonFileStore`]) whose writes are atomic (temp file + rename).

pub mod fs;
pub mod json;

pub use fs::FsDocumentStore;
pub use json::{JsonFileStore, read_json, write_json_atomic};

use thiserror::Error;

use crate::types::ReleaseNotesSummary;

/// Errors raised by the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to (de)serialize persisted JSON.
    #[error("failed to parse stored JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No document is stored under the key.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The key cannot be mapped to a storage location.
    #[error("invalid store key: {0:?}")]
    InvalidKey(String),
}

/// Key → content blob store for raw cached documents.
pub trait DocumentStore {
    /// Returns the content stored under `key`.
    ///
    /// ## Errors
    ///
    /// `StoreError::NotFound` when nothing is stored under the key.
    fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Stores `content` under `key`, replacing any previous content.
    fn put(&self, key: &str, content: &str) -> Result<(), StoreError>;

    /// Whether a document is stored under `key`.
    fn contains(&self, key: &str) -> bool;

    /// Every stored key, in lexical order.
    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Every stored key except the index sentinel, in lexical order.
    fn release_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .keys()?
            .into_iter()
            .filter(|key| key != crate::types::INDEX_KEY)
            .collect())
    }
}

/// Durable storage for the final summary.
pub trait SummaryStore {
    /// Loads the persisted summary, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<ReleaseNotesSummary>, StoreError>;

    /// Persists the summary, replacing the previous one.
    fn save(&self, summary: &ReleaseNotesSummary) -> Result<(), StoreError>;
}

/// Rejects keys that are empty or could escape the store directory.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.trim().is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
        || key.contains('\0');
    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
