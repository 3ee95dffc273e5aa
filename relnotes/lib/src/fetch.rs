//! Downloading release documents into a [`DocumentStore`].

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use thiserror::Error;
use tracing::{Span, debug, info, instrument, warn};

use crate::config::Config;
use crate::store::{DocumentStore, StoreError};
use crate::types::INDEX_KEY;

/// `/release/<dotted-version>/` in an index link.
static RELEASE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/release/(\d+(?:\.\d+)*)/").expect("valid release link regex")
});

const USER_AGENT: &str = concat!("relnotes/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while fetching documents.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or HTTP client error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("GET {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The fetched document could not be stored
    #[error("failed to store document: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of a [`fetch_releases`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    /// Versions downloaded and stored
    pub fetched: Vec<String>,
    /// Versions already cached
    pub skipped: Vec<String>,
    /// Versions that failed to download or store
    pub failed: Vec<String>,
}

/// HTTP client used for document downloads.
///
/// ## Errors
///
/// Returns `FetchError::Http` if the client cannot be built.
pub fn http_client() -> Result<Client, FetchError> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Downloads one document as text.
#[instrument(
    name = "fetch_document",
    skip(client),
    fields(http.status_code = tracing::field::Empty, otel.kind = "client")
)]
pub async fn fetch_document(client: &Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    Span::current().record("http.status_code", status.as_u16());

    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    debug!(bytes = body.len(), "Fetched document");
    Ok(body)
}

/// Release versions linked from an index page, deduplicated, in document order.
///
/// ## Examples
///
/// ```
/// use relnotes_lib::fetch::parse_index;
///
/// let html = r#"<a href="/docs/release/16.1/">16.1</a> <a href="/docs/release/16.0/">16.0</a>
///               <a href="/docs/release/16.1/">again</a> <a href="/about/">about</a>"#;
/// assert_eq!(parse_index(html), vec!["16.1", "16.0"]);
/// ```
pub fn parse_index(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut versions: Vec<String> = Vec::new();
    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if let Some(caps) = RELEASE_LINK.captures(href)
            && let Some(version) = caps.get(1)
            && !versions.iter().any(|v| v == version.as_str())
        {
            versions.push(version.as_str().to_string());
        }
    }
    versions
}

/// URL of one release document under the index URL.
pub fn release_url(index_url: &str, version: &str) -> String {
    format!("{}/{}/", index_url.trim_end_matches('/'), version)
}

/// Downloads the index page, stores it under `"index"`, and returns the
/// versions it links to.
///
/// ## Errors
///
/// Returns `FetchError` if the index cannot be downloaded or stored.
pub async fn fetch_index<S: DocumentStore>(
    client: &Client,
    config: &Config,
    store: &S,
) -> Result<Vec<String>, FetchError> {
    let html = fetch_document(client, &config.release_index_url).await?;
    store.put(INDEX_KEY, &html)?;

    let versions = parse_index(&html);
    info!(versions = versions.len(), "Parsed release index");
    Ok(versions)
}

/// Downloads every version not yet cached (or all of them with `force`).
///
/// Waits `config.request_delay` before each download. Failures are logged
/// and recorded in the report; they never stop the run.
pub async fn fetch_releases<S: DocumentStore>(
    client: &Client,
    config: &Config,
    store: &S,
    versions: &[String],
    force: bool,
) -> FetchReport {
    let mut report = FetchReport::default();

    for version in versions {
        if !force && store.contains(version) {
            debug!(version = %version, "Already cached");
            report.skipped.push(version.clone());
            continue;
        }

        if !config.request_delay.is_zero() {
            tokio::time::sleep(config.request_delay).await;
        }

        let url = release_url(&config.release_index_url, version);
        let stored = match fetch_document(client, &url).await {
            Ok(html) => store.put(version, &html).map_err(FetchError::from),
            Err(e) => Err(e),
        };

        match stored {
            Ok(()) => report.fetched.push(version.clone()),
            Err(e) => {
                warn!(version = %version, error = %e, "Failed to fetch release; skipping");
                report.failed.push(version.clone());
            }
        }
    }

    info!(
        fetched = report.fetched.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Fetch finished"
    );
    report
}
