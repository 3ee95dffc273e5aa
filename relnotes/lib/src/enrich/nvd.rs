//! NVD CVE API 2.0 client.
//!
//! Queries `GET {endpoint}?cveId=<id>` and maps the wire response
//! (`vulnerabilities[].cve.metrics`) onto [`AdvisoryResponse`].
//!
//! ## Rate Limiting
//!
//! The NVD answers over-budget requests with 403 or 429; both surface as
//! [`AdvisoryError::RateLimitExceeded`]. Pacing between requests is the
//! caller's job (see [`enrich_summary`](super::enrich_summary)).

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{Span, debug, instrument, warn};

use super::{AdvisoryError, AdvisoryLookup, AdvisoryRecord, AdvisoryResponse, CvssMetrics};
use crate::config::{Config, DEFAULT_NVD_ENDPOINT};

const API_KEY_HEADER: &str = "apiKey";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`NvdClient`].
#[derive(Debug, Clone)]
pub struct NvdConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for NvdConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_NVD_ENDPOINT.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl NvdConfig {
    /// Endpoint and API key taken from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.nvd_endpoint.clone(),
            api_key: config.nvd_api_key.clone(),
            ..Self::default()
        }
    }

    /// Set a custom endpoint (useful for testing).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NvdCveResponse {
    #[serde(default)]
    total_results: u64,
    #[serde(default)]
    vulnerabilities: Vec<NvdVulnerability>,
}

#[derive(Debug, Deserialize)]
struct NvdVulnerability {
    cve: NvdCve,
}

#[derive(Debug, Deserialize)]
struct NvdCve {
    #[serde(default)]
    metrics: CvssMetrics,
}

impl From<NvdCveResponse> for AdvisoryResponse {
    fn from(wire: NvdCveResponse) -> Self {
        Self {
            total_results: wire.total_results,
            vulnerabilities: wire
                .vulnerabilities
                .into_iter()
                .map(|v| AdvisoryRecord {
                    metrics: v.cve.metrics,
                })
                .collect(),
        }
    }
}

/// Advisory lookup against the NVD.
#[derive(Clone)]
pub struct NvdClient {
    config: NvdConfig,
    client: Client,
}

impl NvdClient {
    /// Creates a client with its own HTTP connection pool.
    ///
    /// ## Errors
    ///
    /// Returns `AdvisoryError::Http` if the HTTP client cannot be built.
    pub fn new(config: NvdConfig) -> Result<Self, AdvisoryError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &NvdConfig {
        &self.config
    }

    #[instrument(
        name = "nvd_lookup",
        skip(self),
        fields(
            advisory.cve = %cve_id,
            http.status_code = tracing::field::Empty,
            otel.kind = "client"
        )
    )]
    async fn fetch(&self, cve_id: &str) -> Result<AdvisoryResponse, AdvisoryError> {
        let mut request = self
            .client
            .get(&self.config.endpoint)
            .header("Accept", "application/json")
            .query(&[("cveId", cve_id)]);
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.inspect_err(|e| {
            warn!(error = %e, "Advisory request failed");
        })?;

        let status = response.status();
        Span::current().record("http.status_code", status.as_u16());

        if status.as_u16() == 403 || status.as_u16() == 429 {
            warn!(status = status.as_u16(), "Advisory API rate limit hit");
            return Err(AdvisoryError::RateLimitExceeded);
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(status = status.as_u16(), %message, "Advisory API returned error");
            return Err(AdvisoryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let wire: NvdCveResponse = response
            .json()
            .await
            .map_err(|e| AdvisoryError::Parse(e.to_string()))?;

        debug!(total_results = wire.total_results, "Received advisory response");
        Ok(wire.into())
    }
}

impl std::fmt::Debug for NvdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NvdClient")
            .field("endpoint", &self.config.endpoint)
            .field("api_key", &self.config.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl AdvisoryLookup for NvdClient {
    async fn lookup(&self, cve_id: &str) -> Result<AdvisoryResponse, AdvisoryError> {
        self.fetch(cve_id).await
    }
}
