//! Runtime for mounted chat sessions
//!
//! Mounting spawns an actor that owns the conversation store and the request
//! lifecycle. Hosts drive it through a [`SessionHandle`] and observe it
//! through [`SessionView`] snapshots.

mod executor;

#[cfg(test)]
pub mod testing;

use crate::backend::{ChatBackend, Scope};
use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::context::ContextProvider;
use crate::conversation::{ConversationStore, Transcript};
use crate::state_machine::{Lifecycle, SessionContext};
use executor::SessionRuntime;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const COMMAND_BUFFER: usize = 32;

/// Everything the host supplies when mounting a session
#[derive(Clone)]
pub struct MountParams {
    pub scope: Scope,
    /// Source of page context; `None` outside an embedded host
    pub context: Option<Arc<dyn ContextProvider>>,
    pub request_timeout: Duration,
}

impl MountParams {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            context: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_context(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(provider);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// What the presentation layer renders
#[derive(Debug, Clone)]
pub struct SessionView {
    pub transcript: Transcript,
    pub lifecycle: Lifecycle,
    /// Current contents of the input buffer
    pub input: String,
}

impl SessionView {
    fn empty() -> Self {
        Self {
            transcript: ConversationStore::new().current(),
            lifecycle: Lifecycle::Idle,
            input: String::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lifecycle.is_pending()
    }
}

/// Result of a submit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session has been disposed")]
    Disposed,
}

/// Commands from the handle to the session actor
#[derive(Debug)]
pub(crate) enum Command {
    SetInput(String),
    /// `None` submits the current input buffer
    Submit {
        text: Option<String>,
        ack: oneshot::Sender<SubmitOutcome>,
    },
    Cancel {
        ack: oneshot::Sender<bool>,
    },
    Clear {
        ack: oneshot::Sender<bool>,
    },
}

/// Start a session bound to `params.scope`. Must be called inside a tokio
/// runtime.
pub fn mount<B: ChatBackend + 'static>(params: MountParams, backend: B) -> SessionHandle {
    let session_id = Uuid::new_v4();
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (view_tx, view_rx) = watch::channel(SessionView::empty());
    let shutdown = CancellationToken::new();

    tracing::info!(
        %session_id,
        dataset_id = ?params.scope.dataset_id,
        dashboard_id = ?params.scope.dashboard_id,
        has_context = params.context.is_some(),
        "Mounting chat session"
    );

    let runtime = SessionRuntime::new(
        SessionContext::new(session_id, 0),
        params,
        backend,
        command_rx,
        view_tx,
        shutdown.clone(),
    );
    let task = tokio::spawn(runtime.run());

    SessionHandle {
        session_id,
        commands: command_tx,
        view: view_rx,
        shutdown,
        task: Some(task),
    }
}

/// Handle to a mounted session. Dropping it tears the session down.
pub struct SessionHandle {
    session_id: Uuid,
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver that is notified on every published view
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub async fn set_input(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::SetInput(text.into())).await
    }

    /// Submit `text` as the next question
    pub async fn submit(&self, text: impl Into<String>) -> Result<SubmitOutcome, SessionError> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Submit {
            text: Some(text.into()),
            ack,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Disposed)
    }

    /// Submit whatever is in the input buffer
    pub async fn submit_input(&self) -> Result<SubmitOutcome, SessionError> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Submit { text: None, ack }).await?;
        rx.await.map_err(|_| SessionError::Disposed)
    }

    /// Abort the in-flight request. Returns false when nothing was pending.
    pub async fn cancel(&self) -> Result<bool, SessionError> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Cancel { ack }).await?;
        rx.await.map_err(|_| SessionError::Disposed)
    }

    /// Empty the transcript. Refused while a request is in flight.
    pub async fn clear(&self) -> Result<bool, SessionError> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Clear { ack }).await?;
        rx.await.map_err(|_| SessionError::Disposed)
    }

    /// Wait until no request is in flight and return that view
    pub async fn settled(&self) -> Result<SessionView, SessionError> {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(|view| view.lifecycle.is_idle())
            .await
            .map_err(|_| SessionError::Disposed)?;
        Ok(view.clone())
    }

    /// Stop the session and wait for its actor to exit. Any reply still in
    /// flight is discarded.
    pub async fn dispose(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(session_id = %self.session_id, error = %e, "Session task failed");
            }
        }
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        if self.shutdown.is_cancelled() {
            return Err(SessionError::Disposed);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Disposed)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
