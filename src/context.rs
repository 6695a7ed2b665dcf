//! Ambient page context supplied by the host frame
//!
//! The host posts context updates as structured messages. Only messages whose
//! origin equals the hosting origin are considered; everything else is
//! dropped without a trace beyond a debug log.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Type tag of a context update message
pub const CONTEXT_MESSAGE_TYPE: &str = "NL_EXPLORER_CONTEXT";

/// Snapshot of the host application's current view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Hosts send either a name or a numeric id here
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub datasource: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub dashboard: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Label {
    Text(String),
    Number(serde_json::Number),
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Label>::deserialize(deserializer)?.map(|label| match label {
        Label::Text(text) => text,
        Label::Number(number) => number.to_string(),
    }))
}

/// A message delivered from another frame, with its declared origin
#[derive(Debug, Clone)]
pub struct FrameMessage {
    pub origin: String,
    pub data: Value,
}

impl FrameMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }

    /// Build a well-formed context update
    pub fn context_update(origin: impl Into<String>, context: &PageContext) -> Self {
        Self::new(
            origin,
            serde_json::json!({
                "type": CONTEXT_MESSAGE_TYPE,
                "payload": context,
            }),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum HostMessage {
    #[serde(rename = "NL_EXPLORER_CONTEXT")]
    ContextUpdate { payload: PageContext },
    #[serde(other)]
    Other,
}

/// Read side of the page context, injected into the session engine
pub trait ContextProvider: Send + Sync {
    /// Latest context, read atomically
    fn snapshot(&self) -> Arc<PageContext>;

    /// Change notifications; dropping the receiver unsubscribes
    fn subscribe(&self) -> watch::Receiver<Arc<PageContext>>;
}

/// Holds the latest page context received from the host frame
#[derive(Debug)]
pub struct ContextSynchronizer {
    origin: String,
    tx: watch::Sender<Arc<PageContext>>,
}

impl ContextSynchronizer {
    /// `origin` is the hosting document's own origin.
    pub fn new(origin: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(Arc::new(PageContext::default()));
        Self {
            origin: origin.into(),
            tx,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Handle one incoming frame message.
    ///
    /// The snapshot is replaced before this returns, so a request built
    /// right after sees the update. Returns whether the message was applied.
    pub fn receive(&self, message: &FrameMessage) -> bool {
        if message.origin != self.origin {
            tracing::debug!("Discarding frame message from foreign origin");
            return false;
        }

        match HostMessage::deserialize(&message.data) {
            Ok(HostMessage::ContextUpdate { payload }) => {
                tracing::debug!(
                    datasource = ?payload.datasource,
                    dashboard = ?payload.dashboard,
                    "Page context updated"
                );
                self.tx.send_replace(Arc::new(payload));
                true
            }
            Ok(HostMessage::Other) => false,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed frame message");
                false
            }
        }
    }

    /// Feed messages from `messages` until the returned guard is dropped
    /// or the stream ends.
    pub fn listen<S>(self: &Arc<Self>, messages: S) -> ListenerGuard
    where
        S: Stream<Item = FrameMessage> + Send + Unpin + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let sync = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut messages = messages;
            loop {
                tokio::select! {
                    biased;

                    () = token.cancelled() => break,

                    next = messages.next() => match next {
                        Some(message) => {
                            sync.receive(&message);
                        }
                        None => break,
                    },
                }
            }
            tracing::debug!("Context listener stopped");
        });

        ListenerGuard {
            cancel,
            handle: Some(handle),
        }
    }
}

impl ContextProvider for ContextSynchronizer {
    fn snapshot(&self) -> Arc<PageContext> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Arc<PageContext>> {
        self.tx.subscribe()
    }
}

/// Keeps a context listener alive; dropping it detaches the listener.
#[derive(Debug)]
pub struct ListenerGuard {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ListenerGuard {
    /// Detach and wait for the listener task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
