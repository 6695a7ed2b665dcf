//! Client configuration from the environment

use crate::backend::Scope;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://localhost:8088";
const DEFAULT_API_PREFIX: &str = "/api/v1/nl_explorer";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("session cookie is not a valid header value")]
    InvalidCookie,
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}

/// Settings for the chat client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host application URL, e.g. `https://superset.example.com`
    pub base_url: String,
    pub api_prefix: String,
    pub request_timeout: Duration,
    pub dataset_id: Option<i64>,
    pub dashboard_id: Option<i64>,
    /// Sent as the `Cookie` header on every request
    pub session_cookie: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dataset_id: None,
            dashboard_id: None,
            session_cookie: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "Ignoring unparsable setting");
                    None
                }
            }
        };
        let id = |key: &str| parsed(key).and_then(|v| i64::try_from(v).ok());

        Self {
            base_url: lookup("ASK_DATA_BASE_URL").unwrap_or(defaults.base_url),
            api_prefix: lookup("ASK_DATA_API_PREFIX").unwrap_or(defaults.api_prefix),
            request_timeout: parsed("ASK_DATA_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map_or(defaults.request_timeout, Duration::from_secs),
            dataset_id: id("ASK_DATA_DATASET_ID"),
            dashboard_id: id("ASK_DATA_DASHBOARD_ID"),
            session_cookie: lookup("ASK_DATA_SESSION_COOKIE").filter(|c| !c.is_empty()),
        }
    }

    /// Base URL of the chat API, without a trailing slash
    pub fn api_root(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
    }

    /// Origin of the hosting document, used to vet frame messages
    pub fn origin(&self) -> Result<String, ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: "URL has no network origin".to_string(),
            });
        }
        Ok(origin.ascii_serialization())
    }

    pub fn scope(&self) -> Scope {
        Scope {
            dataset_id: self.dataset_id,
            dashboard_id: self.dashboard_id,
        }
    }
}
