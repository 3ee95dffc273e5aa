//! Schema-versioned CVSS metrics as returned by the advisory database.
//!
//! The persisted `metrics` value is a faithful copy of the advisory data:
//! fields this crate does not interpret are kept in `extra` maps and written
//! back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity reported when no metric schema is present.
pub const NO_SEVERITY: &str = "None";

/// Metric arrays keyed by CVSS schema version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvssMetrics {
    #[serde(rename = "cvssMetricV31", default, skip_serializing_if = "Vec::is_empty")]
    pub cvss_metric_v31: Vec<CvssV3Record>,
    #[serde(rename = "cvssMetricV30", default, skip_serializing_if = "Vec::is_empty")]
    pub cvss_metric_v30: Vec<CvssV3Record>,
    #[serde(rename = "cvssMetricV2", default, skip_serializing_if = "Vec::is_empty")]
    pub cvss_metric_v2: Vec<CvssV2Record>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One CVSS v3.x metric record; severity lives inside `cvssData`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvssV3Record {
    #[serde(default)]
    pub cvss_data: CvssV3Data,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvssV3Data {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_severity: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One CVSS v2 metric record; severity sits beside `cvssData`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvssV2Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single metric record tagged with its schema version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CvssMetric<'a> {
    V30(&'a CvssV3Record),
    V31(&'a CvssV3Record),
    V2(&'a CvssV2Record),
}

/// Severity label and impact score derived from a metric record.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityScore {
    pub severity: String,
    pub impact_score: f64,
}

impl SeverityScore {
    /// The `("None", 0)` score used when no metric is available.
    pub fn none() -> Self {
        Self {
            severity: NO_SEVERITY.to_string(),
            impact_score: 0.0,
        }
    }
}

impl CvssMetric<'_> {
    /// Extracts severity and impact according to this record's schema.
    pub fn score(&self) -> SeverityScore {
        let (severity, impact) = match self {
            CvssMetric::V30(record) | CvssMetric::V31(record) => {
                (record.cvss_data.base_severity.as_deref(), record.impact_score)
            }
            CvssMetric::V2(record) => (record.base_severity.as_deref(), record.impact_score),
        };
        SeverityScore {
            severity: severity.unwrap_or(NO_SEVERITY).to_string(),
            impact_score: impact.unwrap_or(0.0),
        }
    }

    pub fn schema(&self) -> &'static str {
        match self {
            CvssMetric::V30(_) => "3.0",
            CvssMetric::V31(_) => "3.1",
            CvssMetric::V2(_) => "2.0",
        }
    }
}

impl CvssMetrics {
    /// The record used for scoring: v3.0, then v3.1, then v2.
    ///
    /// Within a schema the first record wins.
    pub fn preferred(&self) -> Option<CvssMetric<'_>> {
        self.cvss_metric_v30
            .first()
            .map(CvssMetric::V30)
            .or_else(|| self.cvss_metric_v31.first().map(CvssMetric::V31))
            .or_else(|| self.cvss_metric_v2.first().map(CvssMetric::V2))
    }

    /// Severity and impact of the preferred record, or [`SeverityScore::none`].
    ///
    /// ## Examples
    ///
    /// ```
    /// use relnotes_lib::enrich::metrics::CvssMetrics;
    ///
    /// let metrics: CvssMetrics = serde_json::from_str(r#"{
    ///     "cvssMetricV2": [{ "baseSeverity": "MEDIUM", "impactScore": 2.9 }]
    /// }"#).unwrap();
    /// let score = metrics.score();
    /// assert_eq!(score.severity, "MEDIUM");
    /// assert_eq!(score.impact_score, 2.9);
    /// ```
    pub fn score(&self) -> SeverityScore {
        self.preferred()
            .map_or_else(SeverityScore::none, |metric| metric.score())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v3(severity: &str, impact: f64) -> Value {
        json!({
            "source": "nvd@nist.gov",
            "type": "Primary",
            "cvssData": { "version": "3.1", "baseScore": 8.8, "baseSeverity": severity },
            "exploitabilityScore": 2.8,
            "impactScore": impact
        })
    }

    fn metrics(value: Value) -> CvssMetrics {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_v30_preferred_over_v31_and_v2() {
        let metrics = metrics(json!({
            "cvssMetricV31": [v3("HIGH", 5.9)],
            "cvssMetricV30": [v3("CRITICAL", 6.0)],
            "cvssMetricV2": [{ "baseSeverity": "LOW", "impactScore": 2.9 }]
        }));

        assert!(matches!(metrics.preferred(), Some(CvssMetric::V30(_))));
        assert_eq!(
            metrics.score(),
            SeverityScore {
                severity: "CRITICAL".into(),
                impact_score: 6.0
            }
        );
    }

    #[test]
    fn test_v31_used_without_v30() {
        let metrics = metrics(json!({
            "cvssMetricV31": [v3("HIGH", 5.9)],
            "cvssMetricV2": [{ "baseSeverity": "LOW", "impactScore": 2.9 }]
        }));

        assert_eq!(metrics.preferred().map(|m| m.schema()), Some("3.1"));
        assert_eq!(metrics.score().severity, "HIGH");
    }

    #[test]
    fn test_v2_reads_severity_beside_cvss_data() {
        let metrics = metrics(json!({
            "cvssMetricV2": [{
                "cvssData": { "version": "2.0", "baseScore": 6.5, "baseSeverity": "IGNORED" },
                "baseSeverity": "MEDIUM",
                "impactScore": 6.4
            }]
        }));

        assert_eq!(metrics.score().severity, "MEDIUM");
        assert_eq!(metrics.score().impact_score, 6.4);
    }

    #[test]
    fn test_empty_metrics_score_none() {
        assert_eq!(CvssMetrics::default().score(), SeverityScore::none());
        assert_eq!(SeverityScore::none().severity, "None");
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let original = json!({
            "cvssMetricV31": [v3("HIGH", 5.9)],
            "cvssMetricV40": [{ "anything": true }]
        });

        let parsed = metrics(original.clone());
        assert_eq!(serde_json::to_value(&parsed).unwrap(), original);
    }
}
