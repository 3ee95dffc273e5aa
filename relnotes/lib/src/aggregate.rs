//! Cross-release aggregation into a [`ReleaseNotesSummary`].

use std::collections::HashSet;

use tracing::{debug, info};

use crate::parse::{extract_cve, is_significant, parse_entry};
use crate::types::{ChangeEntry, ClassifiedRelease, ReleaseNotesSummary, SecurityEntry};

/// Explicit accumulator threaded through aggregation.
///
/// Each call to [`add_release`](Self::add_release) consumes the accumulator
/// and returns the updated one, so a fold over releases yields the summary
/// without any shared state.
#[derive(Debug, Default)]
pub struct SummaryAccumulator {
    summary: ReleaseNotesSummary,
    seen_contributors: HashSet<String>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one classified release into the summary.
    ///
    /// Security and bug entries carry the version as `fixedIn`; features and
    /// performance entries as `sinceVersion`. A release date replaces any
    /// earlier date recorded for the same version.
    pub fn add_release(mut self, release: &ClassifiedRelease) -> Self {
        let version = (!release.version.is_empty()).then(|| release.version.clone());

        if let Some(version) = &version
            && let Some(date) = &release.release_date
        {
            self.summary
                .version_dates
                .insert(version.clone(), date.clone());
        }

        for fragment in &release.categories.security {
            let parsed = parse_entry(fragment);
            self.record_contributors(&parsed.contributors);
            self.summary.security.push(SecurityEntry {
                title: parsed.title,
                description: parsed.description,
                fixed_in: version.clone(),
                contributors: parsed.contributors,
                cve: extract_cve(fragment),
                ..Default::default()
            });
        }

        let categories = &release.categories;
        for fragment in &categories.performance {
            let entry = self.change_entry(fragment, None, version.clone());
            self.summary.performance.push(entry);
        }
        for fragment in &categories.features {
            let entry = self.change_entry(fragment, None, version.clone());
            self.summary.features.push(entry);
        }
        for fragment in &categories.bugs {
            let entry = self.change_entry(fragment, version.clone(), None);
            self.summary.bugs.push(entry);
        }

        debug!(
            version = %release.version,
            items = release.categories.len(),
            "Aggregated release"
        );
        self
    }

    /// The accumulated summary.
    pub fn finish(self) -> ReleaseNotesSummary {
        self.summary
    }

    fn change_entry(
        &mut self,
        fragment: &str,
        fixed_in: Option<String>,
        since_version: Option<String>,
    ) -> ChangeEntry {
        let parsed = parse_entry(fragment);
        self.record_contributors(&parsed.contributors);
        ChangeEntry {
            title: parsed.title,
            description: parsed.description,
            fixed_in,
            since_version,
            significant: is_significant(fragment),
            contributors: parsed.contributors,
        }
    }

    fn record_contributors(&mut self, names: &[String]) {
        for name in names {
            if self.seen_contributors.insert(name.clone()) {
                self.summary.contributors.push(name.clone());
            }
        }
    }
}

/// Aggregates classified releases in the order given.
///
/// ## Examples
///
/// ```
/// use relnotes_lib::aggregate::aggregate;
/// use relnotes_lib::types::{Categories, ClassifiedRelease};
///
/// let release = ClassifiedRelease {
///     version: "16.1".into(),
///     release_date: Some("2023-11-09".into()),
///     categories: Categories {
///         bugs: vec!["Fix crash in parser (Carol)".into()],
///         ..Default::default()
///     },
/// };
/// let summary = aggregate(&[release]);
/// assert_eq!(summary.bugs[0].title, "Fix crash in parser");
/// assert_eq!(summary.bugs[0].fixed_in.as_deref(), Some("16.1"));
/// assert_eq!(summary.version_dates["16.1"], "2023-11-09");
/// ```
pub fn aggregate(releases: &[ClassifiedRelease]) -> ReleaseNotesSummary {
    let summary = releases
        .iter()
        .fold(SummaryAccumulator::new(), SummaryAccumulator::add_release)
        .finish();

    info!(
        releases = releases.len(),
        entries = summary.total_entries(),
        contributors = summary.contributors.len(),
        "Aggregated release notes"
    );
    summary
}
