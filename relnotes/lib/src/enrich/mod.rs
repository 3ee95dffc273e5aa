//! Advisory enrichment of security entries.
//!
//! Enrichment is a read-transform-write cycle: [`enrich_step`] is a pure
//! function from the current summary and one lookup outcome to the next
//! summary, and [`enrich_summary`] persists every intermediate summary
//! through a [`SummaryStore`]. An interrupted run resumes where it stopped
//! because entries that already carry metrics are never queried again.

pub mod metrics;
pub mod nvd;

pub use metrics::{CvssMetric, CvssMetrics, SeverityScore};
pub use nvd::{NvdClient, NvdConfig};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::{StoreError, SummaryStore};
use crate::types::{ReleaseNotesSummary, SecurityEntry};

/// Errors raised by advisory lookups.
#[derive(Debug, Error)]
pub enum AdvisoryError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service refused the request because of its request budget
    #[error("advisory API rate limit exceeded")]
    RateLimitExceeded,

    /// Non-success response
    #[error("advisory API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected shape
    #[error("failed to parse advisory response: {0}")]
    Parse(String),
}

/// Result of looking up one CVE identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryResponse {
    pub total_results: u64,
    #[serde(default)]
    pub vulnerabilities: Vec<AdvisoryRecord>,
}

impl AdvisoryResponse {
    /// Metrics of the single matching record, or `None` unless exactly one
    /// record matched.
    pub fn into_unique_metrics(self) -> Option<CvssMetrics> {
        if self.total_results != 1 {
            return None;
        }
        self.vulnerabilities.into_iter().next().map(|r| r.metrics)
    }
}

/// One vulnerability record in an [`AdvisoryResponse`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    #[serde(default)]
    pub metrics: CvssMetrics,
}

/// CVE lookup capability.
///
/// Uses native async functions in traits; no `async-trait` needed.
pub trait AdvisoryLookup: Send + Sync {
    /// Looks up a CVE identifier such as `"CVE-2023-5869"`.
    ///
    /// ## Errors
    ///
    /// Returns `AdvisoryError` when the service cannot be reached or answers
    /// with an error. A CVE that simply does not exist is a successful
    /// response with `total_results == 0`.
    fn lookup(
        &self,
        cve_id: &str,
    ) -> impl std::future::Future<Output = Result<AdvisoryResponse, AdvisoryError>> + Send;
}

/// Counters describing one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    /// Lookups issued
    pub queried: usize,
    /// Entries that received metrics in this pass
    pub enriched: usize,
    /// Entries that already had metrics; derived fields recomputed
    pub repaired: usize,
    /// Lookups without exactly one match
    pub not_found: usize,
    /// Lookups that failed
    pub failed: usize,
    /// Entries without a CVE identifier
    pub skipped: usize,
}

/// Returns `entry` with `metrics` attached and severity fields derived.
pub fn apply_metrics(entry: &SecurityEntry, metrics: CvssMetrics) -> SecurityEntry {
    let score = metrics.score();
    SecurityEntry {
        metrics: Some(metrics),
        severity: Some(score.severity),
        impact_score: Some(score.impact_score),
        ..entry.clone()
    }
}

/// Computes the summary that follows processing security entry `index`.
///
/// With `Some(metrics)` the entry is enriched. With `None` an entry that
/// already carries metrics has its severity and impact recomputed from them;
/// any other entry is left as is. An out-of-range index returns the summary
/// unchanged.
///
/// ## Examples
///
/// ```
/// use relnotes_lib::enrich::{enrich_step, CvssMetrics};
/// use relnotes_lib::types::{ReleaseNotesSummary, SecurityEntry};
///
/// let summary = ReleaseNotesSummary {
///     security: vec![SecurityEntry { cve: Some("CVE-2023-5869".into()), ..Default::default() }],
///     ..Default::default()
/// };
/// let next = enrich_step(&summary, 0, Some(CvssMetrics::default()));
/// assert_eq!(next.security[0].severity.as_deref(), Some("None"));
/// assert!(summary.security[0].metrics.is_none());
/// ```
pub fn enrich_step(
    state: &ReleaseNotesSummary,
    index: usize,
    metrics: Option<CvssMetrics>,
) -> ReleaseNotesSummary {
    let Some(entry) = state.security.get(index) else {
        return state.clone();
    };

    let updated = match (metrics, &entry.metrics) {
        (Some(metrics), _) => apply_metrics(entry, metrics),
        (None, Some(existing)) => apply_metrics(entry, existing.clone()),
        (None, None) => return state.clone(),
    };

    let mut next = state.clone();
    next.security[index] = updated;
    next
}

/// Enriches every security entry, persisting after each one.
///
/// Entries with metrics are repaired without a lookup. For the rest, the
/// function waits `delay`, queries `lookup` by CVE id, and attaches metrics
/// only when exactly one record matched. Lookup failures are logged and the
/// entry is left for a later run.
///
/// ## Errors
///
/// Returns `StoreError` if an intermediate summary cannot be persisted.
pub async fn enrich_summary<L, S>(
    summary: ReleaseNotesSummary,
    lookup: &L,
    store: &S,
    delay: Duration,
) -> Result<(ReleaseNotesSummary, EnrichReport), StoreError>
where
    L: AdvisoryLookup,
    S: SummaryStore,
{
    let mut report = EnrichReport::default();
    let mut state = summary;

    for index in 0..state.security.len() {
        let entry = &state.security[index];

        let next = if entry.is_enriched() {
            report.repaired += 1;
            enrich_step(&state, index, None)
        } else if let Some(cve) = entry.cve.clone() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            report.queried += 1;

            match lookup.lookup(&cve).await {
                Ok(response) => {
                    let total = response.total_results;
                    match response.into_unique_metrics() {
                        Some(metrics) => {
                            report.enriched += 1;
                            debug!(cve = %cve, "Attached advisory metrics");
                            enrich_step(&state, index, Some(metrics))
                        }
                        None => {
                            report.not_found += 1;
                            debug!(cve = %cve, total_results = total, "No unique advisory match");
                            continue;
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(cve = %cve, error = %e, "Advisory lookup failed; skipping");
                    continue;
                }
            }
        } else {
            report.skipped += 1;
            continue;
        };

        state = next;
        store.save(&state)?;
    }

    // Unchanged runs still leave the current summary on disk
    store.save(&state)?;

    info!(
        queried = report.queried,
        enriched = report.enriched,
        repaired = report.repaired,
        not_found = report.not_found,
        failed = report.failed,
        "Enrichment finished"
    );
    Ok((state, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    /// In-memory lookup that counts calls.
    #[derive(Default)]
    struct FakeLookup {
        responses: HashMap<String, AdvisoryResponse>,
        failing: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeLookup {
        fn with(mut self, cve: &str, response: AdvisoryResponse) -> Self {
            self.responses.insert(cve.to_string(), response);
            self
        }

        fn failing(mut self, cve: &str) -> Self {
            self.failing.push(cve.to_string());
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AdvisoryLookup for FakeLookup {
        async fn lookup(&self, cve_id: &str) -> Result<AdvisoryResponse, AdvisoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|c| c == cve_id) {
                return Err(AdvisoryError::Api {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(self.responses.get(cve_id).cloned().unwrap_or_default())
        }
    }

    /// Summary store that records every save.
    #[derive(Default)]
    struct RecordingStore {
        saves: Mutex<Vec<ReleaseNotesSummary>>,
    }

    impl SummaryStore for RecordingStore {
        fn load(&self) -> Result<Option<ReleaseNotesSummary>, StoreError> {
            Ok(self.saves.lock().unwrap().last().cloned())
        }

        fn save(&self, summary: &ReleaseNotesSummary) -> Result<(), StoreError> {
            self.saves.lock().unwrap().push(summary.clone());
            Ok(())
        }
    }

    fn single(metrics: serde_json::Value) -> AdvisoryResponse {
        AdvisoryResponse {
            total_results: 1,
            vulnerabilities: vec![AdvisoryRecord {
                metrics: serde_json::from_value(metrics).unwrap(),
            }],
        }
    }

    fn high_v31() -> serde_json::Value {
        json!({
            "cvssMetricV31": [{
                "cvssData": { "baseSeverity": "HIGH", "baseScore": 8.8 },
                "impactScore": 5.9
            }]
        })
    }

    fn security(cve: Option<&str>) -> SecurityEntry {
        SecurityEntry {
            title: "Fix overflow".into(),
            fixed_in: Some("16.1".into()),
            cve: cve.map(str::to_string),
            ..Default::default()
        }
    }

    fn summary(entries: Vec<SecurityEntry>) -> ReleaseNotesSummary {
        ReleaseNotesSummary {
            security: entries,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_enriches_unique_match() {
        let lookup = FakeLookup::default().with("CVE-2023-5869", single(high_v31()));
        let store = RecordingStore::default();

        let (result, report) = enrich_summary(
            summary(vec![security(Some("CVE-2023-5869"))]),
            &lookup,
            &store,
            Duration::ZERO,
        )
        .await
        .unwrap();

        let entry = &result.security[0];
        assert!(entry.is_enriched());
        assert_eq!(entry.severity.as_deref(), Some("HIGH"));
        assert_eq!(entry.impact_score, Some(5.9));
        assert_eq!(report.queried, 1);
        assert_eq!(report.enriched, 1);
    }

    #[tokio::test]
    async fn test_second_run_performs_no_lookups() {
        let lookup = FakeLookup::default().with("CVE-2023-5869", single(high_v31()));
        let store = RecordingStore::default();
        let input = summary(vec![security(Some("CVE-2023-5869"))]);

        let (first, _) = enrich_summary(input, &lookup, &store, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(lookup.calls(), 1);

        let (second, report) = enrich_summary(first.clone(), &lookup, &store, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(lookup.calls(), 1);
        assert_eq!(report.queried, 0);
        assert_eq!(report.repaired, 1);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_ambiguous_and_missing_results_are_skipped() {
        let ambiguous = AdvisoryResponse {
            total_results: 2,
            vulnerabilities: vec![AdvisoryRecord::default(), AdvisoryRecord::default()],
        };
        let lookup = FakeLookup::default().with("CVE-2020-0001", ambiguous);
        let store = RecordingStore::default();

        let (result, report) = enrich_summary(
            summary(vec![security(Some("CVE-2020-0001")), security(Some("CVE-2020-0002"))]),
            &lookup,
            &store,
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert!(result.security.iter().all(|e| !e.is_enriched()));
        assert_eq!(report.not_found, 2);
        assert_eq!(report.enriched, 0);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_failed_lookup_does_not_stop_later_items() {
        let lookup = FakeLookup::default()
            .failing("CVE-2020-0001")
            .with("CVE-2020-0002", single(high_v31()));
        let store = RecordingStore::default();

        let (result, report) = enrich_summary(
            summary(vec![security(Some("CVE-2020-0001")), security(Some("CVE-2020-0002"))]),
            &lookup,
            &store,
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert!(!result.security[0].is_enriched());
        assert!(result.security[1].is_enriched());
        assert_eq!(report.failed, 1);
        assert_eq!(report.enriched, 1);
        assert!(logs_contain("Advisory lookup failed"));
        assert_eq!(store.load().unwrap(), Some(result));
    }

    #[tokio::test]
    async fn test_persists_after_each_changed_item() {
        let lookup = FakeLookup::default()
            .with("CVE-2020-0001", single(high_v31()))
            .with("CVE-2020-0002", single(json!({})));
        let store = RecordingStore::default();

        let (result, _) = enrich_summary(
            summary(vec![security(Some("CVE-2020-0001")), security(Some("CVE-2020-0002"))]),
            &lookup,
            &store,
            Duration::ZERO,
        )
        .await
        .unwrap();

        let saves = store.saves.lock().unwrap();
        // one save per enriched item plus the final one
        assert_eq!(saves.len(), 3);
        assert!(saves[0].security[0].is_enriched());
        assert!(!saves[0].security[1].is_enriched());
        assert_eq!(saves[2], result);
    }

    #[tokio::test]
    async fn test_entries_without_cve_are_not_queried() {
        let lookup = FakeLookup::default();
        let store = RecordingStore::default();

        let (_, report) =
            enrich_summary(summary(vec![security(None)]), &lookup, &store, Duration::ZERO)
                .await
                .unwrap();

        assert_eq!(lookup.calls(), 0);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_enrich_step_repairs_stale_severity() {
        let mut entry = apply_metrics(
            &security(Some("CVE-2020-0001")),
            serde_json::from_value(high_v31()).unwrap(),
        );
        entry.severity = Some("stale".into());
        entry.impact_score = None;
        let state = summary(vec![entry]);

        let next = enrich_step(&state, 0, None);

        assert_eq!(next.security[0].severity.as_deref(), Some("HIGH"));
        assert_eq!(next.security[0].impact_score, Some(5.9));
        assert_eq!(state.security[0].severity.as_deref(), Some("stale"));
    }

    #[test]
    fn test_enrich_step_without_metrics_is_identity() {
        let state = summary(vec![security(Some("CVE-2020-0001"))]);
        assert_eq!(enrich_step(&state, 0, None), state);
        assert_eq!(enrich_step(&state, 7, None), state);
    }

    #[test]
    fn test_empty_metrics_default_to_none_severity() {
        let entry = apply_metrics(&security(None), CvssMetrics::default());
        assert_eq!(entry.severity.as_deref(), Some("None"));
        assert_eq!(entry.impact_score, Some(0.0));
    }
}
