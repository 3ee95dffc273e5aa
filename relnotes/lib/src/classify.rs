//! Keyword-based change classification.
//!
//! Classification walks [`CLASSIFICATION_RULES`] in order; the first rule
//! whose keyword appears in the lowercased fragment wins, and anything left
//! over is a bug fix. Rules flagged `major_only` are skipped for point
//! releases, which only ever ship fixes and security patches.

use tracing::debug;

use crate::types::{Categories, Category, ClassifiedRelease, Release};

/// One entry of the ordered classification policy.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub category: Category,
    /// Lowercase substrings; any match selects the category
    pub keywords: &'static [&'static str],
    /// Whether the rule applies to major releases only
    pub major_only: bool,
}

impl CategoryRule {
    fn matches(&self, lowercase_fragment: &str) -> bool {
        self.keywords.iter().any(|k| lowercase_fragment.contains(k))
    }
}

const SECURITY_KEYWORDS: &[&str] = &["cve"];

const PERFORMANCE_KEYWORDS: &[&str] = &[
    "performance",
    "speed",
    "faster",
    "optimization",
    "improve",
    "reduce",
    "enhance",
    "boost",
    "accelerate",
    "better",
    "efficient",
];

const FEATURE_KEYWORDS: &[&str] = &[
    "new feature",
    "new function",
    "new option",
    "new parameter",
    "new setting",
    "new server variable",
    "new configuration",
    "new command",
    "new subcommand",
    "new clause",
    "new syntax",
    "new keyword",
    "new operator",
    "new aggregate",
    "new data type",
    "new type",
    "new view",
    "new system view",
    "new column",
    "new catalog",
    "new index",
    "new statistic",
    "new privilege",
    "new role",
    "new mode",
    "new flag",
    "new hook",
    "new api",
    "new protocol",
    "new extension",
    "new module",
    "new utility",
    "new tool",
    "new capability",
    "new support",
];

/// Ordered, first-match-wins classification policy. Bugs is the fallback.
pub const CLASSIFICATION_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: Category::Security,
        keywords: SECURITY_KEYWORDS,
        major_only: false,
    },
    CategoryRule {
        category: Category::Performance,
        keywords: PERFORMANCE_KEYWORDS,
        major_only: true,
    },
    CategoryRule {
        category: Category::Features,
        keywords: FEATURE_KEYWORDS,
        major_only: true,
    },
];

/// Category used when no rule matches.
pub const FALLBACK_CATEGORY: Category = Category::Bugs;

/// Assigns one fragment to exactly one category.
///
/// ## Examples
///
/// ```
/// use relnotes_lib::classify::classify_item;
/// use relnotes_lib::types::Category;
///
/// assert_eq!(classify_item("Fix CVE-2023-5869 overflow", false), Category::Security);
/// assert_eq!(classify_item("Add new feature for logging", true), Category::Features);
/// assert_eq!(classify_item("Add new feature for logging", false), Category::Bugs);
/// ```
pub fn classify_item(fragment: &str, major_release: bool) -> Category {
    let lower = fragment.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .filter(|rule| major_release || !rule.major_only)
        .find(|rule| rule.matches(&lower))
        .map_or(FALLBACK_CATEGORY, |rule| rule.category)
}

/// Partitions a release's fragments into category buckets, preserving order.
pub fn classify_release(release: Release) -> ClassifiedRelease {
    let major_release = release.is_major();
    let mut categories = Categories::default();

    for change in release.changes {
        let category = classify_item(&change, major_release);
        categories.bucket_mut(category).push(change);
    }

    debug!(
        version = %release.version,
        major_release,
        security = categories.security.len(),
        performance = categories.performance.len(),
        features = categories.features.len(),
        bugs = categories.bugs.len(),
        "Classified release"
    );

    ClassifiedRelease {
        version: release.version,
        release_date: release.release_date,
        categories,
    }
}
