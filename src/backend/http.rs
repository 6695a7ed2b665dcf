//! HTTP implementation of the chat backend

use super::types::{
    ChatReply, ChatRequest, DatasetListing, DatasetSummary, ErrorBody, ExecuteAction,
    ExecuteRequest, ExecuteResult, PluginConfig,
};
use super::{BackendError, ChatBackend};
use crate::config::{ClientConfig, ConfigError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the chat API mounted under the host application
pub struct HttpBackend {
    client: Client,
    api_root: String,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        // Validates the base URL before any request is attempted
        config.origin()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie).map_err(|_| ConfigError::InvalidCookie)?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            api_root: config.api_root(),
            timeout: config.request_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.api_root)
    }

    /// Fetch the plugin's public settings
    pub async fn plugin_config(&self) -> Result<PluginConfig, BackendError> {
        let request = self
            .client
            .get(self.endpoint("config"))
            .timeout(self.timeout);
        Self::send(request).await
    }

    /// List the datasets the current user may ask about
    pub async fn datasets(&self) -> Result<Vec<DatasetSummary>, BackendError> {
        let request = self
            .client
            .get(self.endpoint("context"))
            .timeout(self.timeout);
        let listing: DatasetListing = Self::send(request).await?;
        Ok(listing.datasets)
    }

    /// Run a structured action outside the chat flow. The server reports
    /// action failures in the result; `Err` means the call itself failed.
    pub async fn execute(&self, action: &ExecuteAction) -> Result<ExecuteResult, BackendError> {
        tracing::info!(kind = %action.kind, "Executing action");
        let request = self
            .client
            .post(self.endpoint("execute"))
            .timeout(self.timeout)
            .json(&ExecuteRequest { action });
        Self::send(request).await
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
        let response = request.send().await.map_err(classify)?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::timeout(format!("Request timeout: {e}"))
            } else {
                BackendError::network(format!("Failed to read response: {e}"))
            }
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.detail());
            return Err(BackendError::status(status.as_u16(), detail.as_deref()));
        }

        serde_json::from_str(&body)
            .map_err(|e| BackendError::malformed(format!("Malformed response: {e}")))
    }
}

/// Sort a transport failure into the error taxonomy. Anything that is
/// neither a timeout nor a transport fault (redirect loops, bad request
/// construction) is reported as unknown.
fn classify(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::timeout(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        BackendError::network(format!("Connection failed: {e}"))
    } else if e.is_request() || e.is_body() {
        BackendError::network(format!("Request failed: {e}"))
    } else {
        BackendError::unknown(format!("Request failed: {e}"))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        let builder = self
            .client
            .post(self.endpoint("chat"))
            .timeout(self.timeout)
            .json(request);
        Self::send(builder).await
    }
}
