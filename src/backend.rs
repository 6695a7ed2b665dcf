//! Chat backend abstraction
//!
//! The engine talks to the backend only through [`ChatBackend`], so tests
//! can substitute scripted backends.

mod error;
mod http;
mod types;


pub use error::{BackendError, BackendErrorKind};
pub use http::HttpBackend;
pub use types::{
    ChatReply, ChatRequest, ColumnInfo, DatasetSummary, ExecuteAction, ExecuteResult,
    PluginConfig, Scope, WireTurn,
};

use async_trait::async_trait;
use std::sync::Arc;

/// One synchronous chat turn against the backend
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError>;
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        (**self).chat(request).await
    }
}

/// Logging wrapper for chat backends
pub struct LoggingBackend {
    inner: Arc<dyn ChatBackend>,
}

impl LoggingBackend {
    pub fn new(inner: Arc<dyn ChatBackend>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ChatBackend for LoggingBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        let start = std::time::Instant::now();
        let result = self.inner.chat(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    turns = request.conversation.len(),
                    actions = reply.actions.as_ref().map_or(0, Vec::len),
                    "Chat request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    turns = request.conversation.len(),
                    kind = e.kind.as_str(),
                    status = ?e.status,
                    error = %e.message,
                    "Chat request failed"
                );
            }
        }

        result
    }
}
