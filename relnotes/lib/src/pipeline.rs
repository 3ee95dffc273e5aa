//! Stage orchestration: document store → releases file → summary file.
//!
//! Each stage is a plain function over values so callers can run them one
//! at a time (as the CLI subcommands do) or chained.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::aggregate::aggregate;
use crate::classify::classify_release;
use crate::config::{Config, ConfigError};
use crate::enrich::AdvisoryError;
use crate::extract::extract_release;
use crate::fetch::FetchError;
use crate::links::rewrite_links;
use crate::store::{DocumentStore, StoreError, read_json, write_json_atomic};
use crate::types::{ClassifiedRelease, ReleaseNotesSummary};

pub use crate::enrich::{EnrichReport, enrich_summary};

/// Errors that stop a pipeline stage as a whole.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Advisory(#[from] AdvisoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Extracts and classifies every cached release document.
///
/// Documents are processed in lexical key order; the index document is
/// skipped. A document that cannot be read is logged and skipped.
///
/// ## Errors
///
/// Only failure to enumerate the store's keys is fatal.
pub fn build_releases<S: DocumentStore>(
    store: &S,
    config: &Config,
) -> Result<Vec<ClassifiedRelease>, PipelineError> {
    let keys = store.release_keys()?;
    let mut releases = Vec::with_capacity(keys.len());

    for key in &keys {
        let html = match store.get(key) {
            Ok(html) => html,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cached document; skipping");
                continue;
            }
        };

        let release = extract_release(key, &html, &config.docs_base);
        releases.push(classify_release(release));
    }

    info!(
        documents = keys.len(),
        releases = releases.len(),
        "Built releases from cache"
    );
    Ok(releases)
}

/// Writes the intermediate per-release file.
pub fn write_releases(path: &Path, releases: &[ClassifiedRelease]) -> Result<(), StoreError> {
    write_json_atomic(path, releases)
}

/// Reads the intermediate per-release file.
///
/// ## Errors
///
/// `StoreError::NotFound` if the file does not exist.
pub fn read_releases(path: &Path) -> Result<Vec<ClassifiedRelease>, StoreError> {
    read_json(path)?.ok_or_else(|| StoreError::NotFound(path.display().to_string()))
}

/// Aggregates classified releases into the summary.
pub fn summarize(releases: &[ClassifiedRelease]) -> ReleaseNotesSummary {
    aggregate(releases)
}

/// Rewrites documentation links across the summary.
pub fn rewrite_summary_links(summary: &ReleaseNotesSummary, docs_base: &str) -> ReleaseNotesSummary {
    rewrite_links(summary, docs_base)
}
