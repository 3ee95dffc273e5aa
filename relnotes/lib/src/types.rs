//! Core data model for the release-notes pipeline.
//!
//! The types here follow the lifecycle of a changelog document: a [`Release`]
//! is produced by the extractor, a [`ClassifiedRelease`] by the classifier, and
//! the category-partitioned [`ReleaseNotesSummary`] by the aggregator. The
//! summary is the persisted artifact that enrichment and link rewriting
//! operate on.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::enrich::metrics::CvssMetrics;

/// Store key reserved for the release-notes index page.
pub const INDEX_KEY: &str = "index";

/// Major version used when an entry carries no version at all.
pub const UNKNOWN_MAJOR: &str = "0";

/// Change category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Security,
    Performance,
    Features,
    Bugs,
}

impl Category {
    /// All categories in classification order.
    pub const ALL: [Category; 4] = [
        Category::Security,
        Category::Performance,
        Category::Features,
        Category::Bugs,
    ];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Security => write!(f, "security"),
            Category::Performance => write!(f, "performance"),
            Category::Features => write!(f, "features"),
            Category::Bugs => write!(f, "bugs"),
        }
    }
}

/// One release document after extraction.
///
/// `changes` holds the normalized markdown of each list entry, in source order.
/// Fields the document did not provide are left empty rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Dotted version string (e.g. "16.4"); empty when the heading was missing
    pub version: String,
    /// Human-readable release date as printed in the document
    pub release_date: Option<String>,
    /// Normalized change fragments, in document order
    pub changes: Vec<String>,
}

impl Release {
    /// Whether this is a major release (minor component is `0`, or absent).
    ///
    /// ## Examples
    ///
    /// ```
    /// use relnotes_lib::types::Release;
    ///
    /// let release = Release { version: "16.0".into(), ..Default::default() };
    /// assert!(release.is_major());
    /// let release = Release { version: "16.1".into(), ..Default::default() };
    /// assert!(!release.is_major());
    /// ```
    pub fn is_major(&self) -> bool {
        is_major_version(&self.version)
    }
}

/// Returns the major component of a dotted version (text before the first `.`).
///
/// Empty versions map to [`UNKNOWN_MAJOR`].
pub fn major_version(version: &str) -> &str {
    let major = version.split('.').next().unwrap_or_default().trim();
    if major.is_empty() { UNKNOWN_MAJOR } else { major }
}

/// Whether a version string denotes a major release.
///
/// A version ending in `.0` is major; so is a bare major number with no
/// minor component. An empty version is never major.
pub fn is_major_version(version: &str) -> bool {
    let version = version.trim();
    if version.is_empty() {
        return false;
    }
    version.ends_with(".0") || !version.contains('.')
}

/// Raw change fragments of one release, partitioned by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categories {
    pub security: Vec<String>,
    pub performance: Vec<String>,
    pub features: Vec<String>,
    pub bugs: Vec<String>,
}

impl Categories {
    /// Mutable bucket for a category.
    pub fn bucket_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Security => &mut self.security,
            Category::Performance => &mut self.performance,
            Category::Features => &mut self.features,
            Category::Bugs => &mut self.bugs,
        }
    }

    /// Bucket for a category.
    pub fn bucket(&self, category: Category) -> &[String] {
        match category {
            Category::Security => &self.security,
            Category::Performance => &self.performance,
            Category::Features => &self.features,
            Category::Bugs => &self.bugs,
        }
    }

    /// Total number of fragments across all buckets.
    pub fn len(&self) -> usize {
        self.security.len() + self.performance.len() + self.features.len() + self.bugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A release whose change fragments have been classified.
///
/// This is the record shape of the intermediate per-release file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedRelease {
    pub version: String,
    pub release_date: Option<String>,
    pub categories: Categories,
}

/// A parsed performance, feature, or bug entry.
///
/// Bugs carry `fixedIn`; features and performance items carry `sinceVersion`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_version: Option<String>,
    #[serde(default)]
    pub significant: bool,
    #[serde(default)]
    pub contributors: Vec<String>,
}

impl ChangeEntry {
    /// The release this entry is attached to, whichever field carries it.
    pub fn version(&self) -> Option<&str> {
        self.fixed_in.as_deref().or(self.since_version.as_deref())
    }
}

/// A parsed security entry, optionally enriched with advisory data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEntry {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_in: Option<String>,
    #[serde(default)]
    pub contributors: Vec<String>,
    /// First CVE identifier found in the fragment
    pub cve: Option<String>,
    /// Advisory metrics as returned by the vulnerability database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<CvssMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_score: Option<f64>,
}

impl SecurityEntry {
    pub fn version(&self) -> Option<&str> {
        self.fixed_in.as_deref()
    }

    /// Whether advisory metrics have already been attached.
    pub fn is_enriched(&self) -> bool {
        self.metrics.is_some()
    }
}

/// The cross-release, category-partitioned result of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseNotesSummary {
    /// Release date per version
    pub version_dates: BTreeMap<String, String>,
    pub security: Vec<SecurityEntry>,
    pub features: Vec<ChangeEntry>,
    pub performance: Vec<ChangeEntry>,
    pub bugs: Vec<ChangeEntry>,
    /// Every contributor credited anywhere, first-seen order
    #[serde(default)]
    pub contributors: Vec<String>,
}

impl ReleaseNotesSummary {
    /// Number of entries across all four categories.
    pub fn total_entries(&self) -> usize {
        self.security.len() + self.features.len() + self.performance.len() + self.bugs.len()
    }

    /// Earliest and latest release dates that parse as `YYYY-MM-DD`.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self
            .version_dates
            .values()
            .filter_map(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    /// Security entries that already carry advisory metrics.
    pub fn enriched_count(&self) -> usize {
        self.security.iter().filter(|e| e.is_enriched()).count()
    }
}
