//! Runtime configuration.
//!
//! Configuration comes from environment variables with sensible defaults.
//! [`Config::from_lookup`] takes the variable source as a function so tests
//! never have to mutate the process environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `RELNOTES_DIR` | `$HOME/.relnotes` |
//! | `RELNOTES_DOCS_BASE` | `https://www.postgresql.org/docs` |
//! | `RELNOTES_INDEX_URL` | `https://www.postgresql.org/docs/release/` |
//! | `RELNOTES_NVD_ENDPOINT` | `https://services.nvd.nist.gov/rest/json/cves/2.0` |
//! | `NVD_API_KEY` | unset |
//! | `RELNOTES_REQUEST_DELAY_MS` | 6000 (600 with an API key) |

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub const RELNOTES_DIR_ENV: &str = "RELNOTES_DIR";
pub const DOCS_BASE_ENV: &str = "RELNOTES_DOCS_BASE";
pub const INDEX_URL_ENV: &str = "RELNOTES_INDEX_URL";
pub const NVD_ENDPOINT_ENV: &str = "RELNOTES_NVD_ENDPOINT";
pub const NVD_API_KEY_ENV: &str = "NVD_API_KEY";
pub const REQUEST_DELAY_ENV: &str = "RELNOTES_REQUEST_DELAY_MS";

pub const DEFAULT_DOCS_BASE: &str = "https://www.postgresql.org/docs";
pub const DEFAULT_INDEX_URL: &str = "https://www.postgresql.org/docs/release/";
pub const DEFAULT_NVD_ENDPOINT: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

/// NVD allows 5 anonymous requests per rolling 30 seconds.
const ANONYMOUS_DELAY: Duration = Duration::from_millis(6000);
/// NVD allows 50 keyed requests per rolling 30 seconds.
const KEYED_DELAY: Duration = Duration::from_millis(600);

/// Errors raised while building a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be used
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// Neither RELNOTES_DIR nor a home directory is available
    #[error("neither RELNOTES_DIR nor a home directory is available")]
    NoDataDir,
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for the cache and all persisted artifacts
    pub data_dir: PathBuf,
    /// Documentation base URL; links resolve under `{docs_base}/{major}/`
    pub docs_base: String,
    /// Release-notes index page; release pages live at `{index}{version}/`
    pub release_index_url: String,
    /// Vulnerability database endpoint
    pub nvd_endpoint: String,
    pub nvd_api_key: Option<String>,
    /// Fixed delay enforced before every external request
    pub request_delay: Duration,
}

impl Config {
    /// Builds configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from the process environment, with an explicit
    /// data directory taking precedence over `RELNOTES_DIR` and `$HOME`.
    pub fn from_env_with_data_dir(data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::from_lookup_with_data_dir(|key| std::env::var(key).ok(), data_dir)
    }

    /// Builds configuration from an arbitrary variable source.
    ///
    /// ## Examples
    ///
    /// ```
    /// use relnotes_lib::config::Config;
    ///
    /// let config = Config::from_lookup(|key| match key {
    ///     "RELNOTES_DIR" => Some("/tmp/relnotes".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(config.cache_dir(), std::path::Path::new("/tmp/relnotes/cache"));
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_with_data_dir(lookup, None)
    }

    /// Like [`Config::from_lookup`]; `data_dir`, when given, wins over the
    /// variable source and the home-directory fallback is never consulted.
    pub fn from_lookup_with_data_dir<F>(
        lookup: F,
        data_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = match (data_dir, non_empty(RELNOTES_DIR_ENV)) {
            (Some(dir), _) => dir,
            (None, Some(dir)) => PathBuf::from(dir),
            (None, None) => dirs::home_dir()
                .map(|home| home.join(".relnotes"))
                .ok_or(ConfigError::NoDataDir)?,
        };

        let nvd_api_key = non_empty(NVD_API_KEY_ENV);

        let request_delay = match non_empty(REQUEST_DELAY_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidValue {
                    key: REQUEST_DELAY_ENV.to_string(),
                    value: raw.clone(),
                })?,
            None if nvd_api_key.is_some() => KEYED_DELAY,
            None => ANONYMOUS_DELAY,
        };

        Ok(Self {
            data_dir,
            docs_base: trim_trailing_slash(
                non_empty(DOCS_BASE_ENV).unwrap_or_else(|| DEFAULT_DOCS_BASE.to_string()),
            ),
            release_index_url: ensure_trailing_slash(
                non_empty(INDEX_URL_ENV).unwrap_or_else(|| DEFAULT_INDEX_URL.to_string()),
            ),
            nvd_endpoint: non_empty(NVD_ENDPOINT_ENV)
                .unwrap_or_else(|| DEFAULT_NVD_ENDPOINT.to_string()),
            nvd_api_key,
            request_delay,
        })
    }

    /// Configuration rooted at `data_dir` with every other value defaulted.
    pub fn with_defaults(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            docs_base: DEFAULT_DOCS_BASE.to_string(),
            release_index_url: DEFAULT_INDEX_URL.to_string(),
            nvd_endpoint: DEFAULT_NVD_ENDPOINT.to_string(),
            nvd_api_key: None,
            request_delay: ANONYMOUS_DELAY,
        }
    }

    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    #[must_use]
    pub fn with_docs_base(mut self, docs_base: impl Into<String>) -> Self {
        self.docs_base = trim_trailing_slash(docs_base.into());
        self
    }

    #[must_use]
    pub fn with_release_index_url(mut self, url: impl Into<String>) -> Self {
        self.release_index_url = ensure_trailing_slash(url.into());
        self
    }

    /// Set a custom advisory endpoint (useful for testing).
    #[must_use]
    pub fn with_nvd_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.nvd_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Directory of the document cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Path of the intermediate per-release file.
    pub fn releases_path(&self) -> PathBuf {
        self.data_dir.join("releases.json")
    }

    /// Path of the final summary file.
    pub fn summary_path(&self) -> PathBuf {
        self.data_dir.join("release_notes.json")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn trim_trailing_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn ensure_trailing_slash(url: String) -> String {
    if url.ends_with('/') { url } else { format!("{url}/") }
}
