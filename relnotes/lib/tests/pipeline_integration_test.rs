//! Integration tests for the release-notes pipeline
//!
//! These tests drive extraction, classification, aggregation, enrichment and
//! link rewriting over the HTML fixtures in `tests/fixtures/cache`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use relnotes_lib::config::Config;
use relnotes_lib::enrich::{NvdClient, NvdConfig};
use relnotes_lib::pipeline::{
    build_releases, enrich_summary, read_releases, rewrite_summary_links, summarize,
    write_releases,
};
use relnotes_lib::store::{DocumentStore, FsDocumentStore, JsonFileStore, SummaryStore};
use relnotes_lib::types::{ChangeEntry, ReleaseNotesSummary};
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture_cache() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("cache")
}

fn fixture_summary() -> ReleaseNotesSummary {
    let store = FsDocumentStore::new(fixture_cache());
    let config = Config::with_defaults(fixture_cache());
    let releases = build_releases(&store, &config).unwrap();
    summarize(&releases)
}

fn nvd_found(severity: &str, impact: f64) -> serde_json::Value {
    serde_json::json!({
        "totalResults": 1,
        "vulnerabilities": [{
            "cve": {
                "metrics": {
                    "cvssMetricV31": [{
                        "cvssData": { "version": "3.1", "baseSeverity": severity },
                        "impactScore": impact
                    }]
                }
            }
        }]
    })
}

#[test]
fn test_single_point_release_bug_entry() {
    let temp = TempDir::new().unwrap();
    let store = FsDocumentStore::new(temp.path().join("cache"));
    store
        .put(
            "16.1",
            r#"<html><body>
                <h2 class="title">E.1. Release 16.1</h2>
                <p>Release date: 2023-11-09</p>
                <div class="itemizedlist"><ul>
                  <li><p>Fix crash in parser (Carol)</p></li>
                </ul></div>
            </body></html>"#,
        )
        .unwrap();

    let releases = build_releases(&store, &Config::with_defaults(temp.path())).unwrap();
    let summary = summarize(&releases);

    assert_eq!(
        summary.bugs,
        vec![ChangeEntry {
            title: "Fix crash in parser".into(),
            description: String::new(),
            fixed_in: Some("16.1".into()),
            since_version: None,
            significant: false,
            contributors: vec!["Carol".into()],
        }]
    );
    assert_eq!(summary.version_dates["16.1"], "2023-11-09");

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["bugs"][0]["fixedIn"], "16.1");
    assert_eq!(json["versionDates"]["16.1"], "2023-11-09");
}

#[test]
fn test_fixture_cache_is_classified_and_aggregated() {
    let summary = fixture_summary();

    assert_eq!(summary.security.len(), 2);
    assert_eq!(summary.performance.len(), 1);
    assert_eq!(summary.features.len(), 1);
    assert_eq!(summary.bugs.len(), 4);

    // "Release 16" counts as a major release
    assert_eq!(summary.version_dates.get("16").map(String::as_str), Some("2023-09-14"));
    assert_eq!(summary.version_dates.get("16.1").map(String::as_str), Some("2023-11-09"));
    assert_eq!(summary.version_dates.len(), 2);

    let perf = &summary.performance[0];
    assert!(perf.significant);
    assert_eq!(perf.since_version.as_deref(), Some("16"));
    assert_eq!(perf.contributors, vec!["Melanie Plageman", "Thomas Munro"]);

    let cves: Vec<_> = summary.security.iter().map(|s| s.cve.as_deref()).collect();
    assert_eq!(cves, vec![Some("CVE-2023-39417"), Some("CVE-2023-5868")]);
    assert_eq!(summary.security[0].contributors, vec!["Micah Gates", "Noah Misch"]);
}

#[test]
fn test_attribution_after_link_is_split_from_title() {
    let summary = fixture_summary();
    let feature = &summary.features[0];

    assert_eq!(
        feature.title,
        "Add new view [`pg_stat_io`](https://www.postgresql.org/docs/16/monitoring-stats.html#MONITORING-PG-STAT-IO-VIEW)"
    );
    assert_eq!(feature.contributors, vec!["Melanie Plageman"]);
    assert_eq!(feature.since_version.as_deref(), Some("16"));
}

#[test]
fn test_point_release_features_fall_to_bugs() {
    let summary = fixture_summary();

    let point_bugs: Vec<_> = summary
        .bugs
        .iter()
        .filter(|b| b.fixed_in.as_deref() == Some("16.1"))
        .map(|b| b.title.as_str())
        .collect();
    assert_eq!(
        point_bugs,
        vec![
            "Add new feature flag checks to pg_upgrade",
            "Make index scans faster on partitioned tables"
        ]
    );
}

#[test]
fn test_malformed_document_does_not_abort_batch() {
    let summary = fixture_summary();

    let unversioned: Vec<_> = summary.bugs.iter().filter(|b| b.fixed_in.is_none()).collect();
    assert_eq!(unversioned.len(), 1);
    assert_eq!(unversioned[0].title, "Fix crash in `psql`");
    assert_eq!(summary.contributors.first().map(String::as_str), Some("Alvaro Herrera"));
}

#[test]
fn test_contributors_are_first_seen_and_unique() {
    let summary = fixture_summary();

    assert_eq!(
        summary.contributors,
        vec![
            "Alvaro Herrera",
            "Micah Gates",
            "Noah Misch",
            "Melanie Plageman",
            "Thomas Munro",
            "Tom Lane",
            "Daniel Gustafsson",
            "Richard Guo",
        ]
    );
}

#[test]
fn test_two_runs_are_byte_identical() {
    let temp = TempDir::new().unwrap();
    let first_path = temp.path().join("first.json");
    let second_path = temp.path().join("second.json");

    JsonFileStore::new(&first_path).save(&fixture_summary()).unwrap();
    JsonFileStore::new(&second_path).save(&fixture_summary()).unwrap();

    assert_eq!(
        std::fs::read(&first_path).unwrap(),
        std::fs::read(&second_path).unwrap()
    );
}

#[test]
fn test_releases_file_feeds_summarize() {
    let temp = TempDir::new().unwrap();
    let store = FsDocumentStore::new(fixture_cache());
    let config = Config::with_defaults(temp.path());
    let path = config.releases_path();

    let releases = build_releases(&store, &config).unwrap();
    write_releases(&path, &releases).unwrap();
    let reread = read_releases(&path).unwrap();

    assert_eq!(reread, releases);
    assert_eq!(summarize(&reread), fixture_summary());
}

#[test]
fn test_link_rewrite_shortens_titles_and_is_idempotent() {
    let summary = fixture_summary();
    let once = rewrite_summary_links(&summary, "https://www.postgresql.org/docs");
    let twice = rewrite_summary_links(&once, "https://www.postgresql.org/docs");

    assert_eq!(once.features[0].title, "Add new view `pg_stat_io`");
    assert_eq!(once.features[0].contributors, vec!["Melanie Plageman"]);
    assert!(
        once.performance[0]
            .description
            .contains("(https://www.postgresql.org/docs/16/parallel-plans.html)")
    );
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_enrichment_persists_and_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("cveId", "CVE-2023-39417"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nvd_found("HIGH", 5.9)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("cveId", "CVE-2023-5868"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nvd_found("MEDIUM", 1.4)))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let summary_store = JsonFileStore::new(temp.path().join("release_notes.json"));
    let client = NvdClient::new(NvdConfig::default().with_endpoint(server.uri())).unwrap();

    let (enriched, report) =
        enrich_summary(fixture_summary(), &client, &summary_store, Duration::ZERO)
            .await
            .unwrap();

    assert_eq!(report.queried, 2);
    assert_eq!(report.enriched, 2);
    assert_eq!(enriched.security[0].severity.as_deref(), Some("HIGH"));
    assert_eq!(enriched.security[1].impact_score, Some(1.4));
    assert_eq!(summary_store.load().unwrap(), Some(enriched.clone()));

    let (again, report) = enrich_summary(enriched.clone(), &client, &summary_store, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(report.queried, 0);
    assert_eq!(report.repaired, 2);
    assert_eq!(again, enriched);
}

#[test]
#[serial]
fn test_config_from_env_reads_data_dir() {
    let temp = TempDir::new().unwrap();
    // SAFETY: serialized with other environment-mutating tests
    unsafe {
        std::env::set_var("RELNOTES_DIR", temp.path());
        std::env::remove_var("RELNOTES_REQUEST_DELAY_MS");
    }

    let config = Config::from_env().unwrap();

    unsafe {
        std::env::remove_var("RELNOTES_DIR");
    }

    assert_eq!(config.data_dir, temp.path());
    assert_eq!(config.cache_dir(), temp.path().join("cache"));
    assert_eq!(config.summary_path(), temp.path().join("release_notes.json"));
}

#[test]
#[serial]
fn test_config_from_env_rejects_bad_delay() {
    // SAFETY: serialized with other environment-mutating tests
    unsafe {
        std::env::set_var("RELNOTES_DIR", "/tmp/relnotes-test");
        std::env::set_var("RELNOTES_REQUEST_DELAY_MS", "soon");
    }

    let result = Config::from_env();

    unsafe {
        std::env::remove_var("RELNOTES_DIR");
        std::env::remove_var("RELNOTES_REQUEST_DELAY_MS");
    }

    assert!(result.is_err());
}
