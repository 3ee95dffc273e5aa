//! Post-pass rewriting of documentation links in the final summary.
//!
//! References to `.html` pages, either markdown links `[text](page.html)` or
//! bare `(page.html#anchor)` groups, are anchored at the documentation root
//! of the entry's major version. Descriptions keep the rewritten link; titles
//! drop link syntax altogether so they stay short. Targets that already carry
//! a scheme are left alone, so a second pass changes nothing.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::extract::normalize::resolve_href;
use crate::types::{ChangeEntry, ReleaseNotesSummary, SecurityEntry, major_version};

/// Optional `[text]` followed by a parenthesized `.html` target.
static HTML_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\[(?P<text>[^\]]*)\])?\((?P<target>[^()\s]+\.html(?:#[^()\s]*)?)\)")
        .expect("valid reference regex")
});

/// Rewrites `.html` references in a description against `{docs_base}/{major}/`.
///
/// ## Examples
///
/// ```
/// use relnotes_lib::links::rewrite_description;
///
/// let base = "https://www.postgresql.org/docs";
/// let once = rewrite_description("See [VACUUM](sql-vacuum.html).", base, "16");
/// assert_eq!(once, "See [VACUUM](https://www.postgresql.org/docs/16/sql-vacuum.html).");
/// assert_eq!(rewrite_description(&once, base, "16"), once);
/// ```
pub fn rewrite_description(text: &str, docs_base: &str, major: &str) -> String {
    HTML_REFERENCE
        .replace_all(text, |caps: &Captures<'_>| {
            let target = resolve_href(&caps["target"], docs_base, major);
            match caps.name("text") {
                Some(label) => format!("[{}]({})", label.as_str(), target),
                None => format!("({target})"),
            }
        })
        .into_owned()
}

/// Removes `.html` references from a title, keeping only link text.
///
/// ## Examples
///
/// ```
/// use relnotes_lib::links::rewrite_title;
///
/// assert_eq!(rewrite_title("Fix [VACUUM](sql-vacuum.html) crash"), "Fix VACUUM crash");
/// assert_eq!(rewrite_title("Fix crash (sql-vacuum.html)"), "Fix crash");
/// ```
pub fn rewrite_title(text: &str) -> String {
    let stripped = HTML_REFERENCE.replace_all(text, |caps: &Captures<'_>| {
        caps.name("text")
            .map(|label| label.as_str().to_string())
            .unwrap_or_default()
    });
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn rewrite_change(entry: &ChangeEntry, docs_base: &str) -> ChangeEntry {
    let major = major_version(entry.version().unwrap_or_default());
    ChangeEntry {
        title: rewrite_title(&entry.title),
        description: rewrite_description(&entry.description, docs_base, major),
        ..entry.clone()
    }
}

fn rewrite_security(entry: &SecurityEntry, docs_base: &str) -> SecurityEntry {
    let major = major_version(entry.version().unwrap_or_default());
    SecurityEntry {
        title: rewrite_title(&entry.title),
        description: rewrite_description(&entry.description, docs_base, major),
        ..entry.clone()
    }
}

/// Returns a copy of `summary` with every entry's links rewritten.
///
/// Entries without a version use the `0` major.
pub fn rewrite_links(summary: &ReleaseNotesSummary, docs_base: &str) -> ReleaseNotesSummary {
    let rewrite_all = |entries: &[ChangeEntry]| -> Vec<ChangeEntry> {
        entries.iter().map(|e| rewrite_change(e, docs_base)).collect()
    };

    let rewritten = ReleaseNotesSummary {
        version_dates: summary.version_dates.clone(),
        security: summary
            .security
            .iter()
            .map(|e| rewrite_security(e, docs_base))
            .collect(),
        features: rewrite_all(&summary.features),
        performance: rewrite_all(&summary.performance),
        bugs: rewrite_all(&summary.bugs),
        contributors: summary.contributors.clone(),
    };

    debug!(entries = rewritten.total_entries(), "Rewrote summary links");
    rewritten
}
