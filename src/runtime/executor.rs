//! Session runtime executor

use super::{Command, IgnoreReason, MountParams, SessionView, SubmitOutcome};
use crate::backend::{BackendError, ChatBackend, ChatRequest, Scope};
use crate::context::ContextProvider;
use crate::conversation::ConversationStore;
use crate::state_machine::{
    transition, Effect, Event, Lifecycle, SessionContext, TransitionError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

const EVENT_BUFFER: usize = 8;

/// Actor owning one session's store and lifecycle
pub(super) struct SessionRuntime<B: ChatBackend + 'static> {
    context: SessionContext,
    state: Lifecycle,
    store: ConversationStore,
    input: String,
    scope: Scope,
    page_context: Option<Arc<dyn ContextProvider>>,
    request_timeout: Duration,
    backend: Arc<B>,
    command_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    view_tx: watch::Sender<SessionView>,
    shutdown: CancellationToken,
    /// Token to cancel the in-flight chat request
    request_cancel_token: Option<CancellationToken>,
}

impl<B: ChatBackend + 'static> SessionRuntime<B> {
    pub(super) fn new(
        context: SessionContext,
        params: MountParams,
        backend: B,
        command_rx: mpsc::Receiver<Command>,
        view_tx: watch::Sender<SessionView>,
        shutdown: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            context,
            state: Lifecycle::Idle,
            store: ConversationStore::new(),
            input: String::new(),
            scope: params.scope,
            page_context: params.context,
            request_timeout: params.request_timeout,
            backend: Arc::new(backend),
            command_rx,
            event_tx,
            event_rx,
            view_tx,
            shutdown,
            request_cancel_token: None,
        }
    }

    pub(super) async fn run(mut self) {
        let session_id = self.context.session_id;
        tracing::info!(%session_id, "Starting session runtime");

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.process_event(event) {
                        tracing::debug!(%session_id, error = %e, "Discarding backend event");
                    }
                }
            }
        }

        // Late replies must never reach a torn-down session
        if let Some(token) = self.request_cancel_token.take() {
            token.cancel();
        }
        tracing::info!(%session_id, "Session runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetInput(text) => {
                self.input = text;
                self.publish_view();
            }
            Command::Submit { text, ack } => {
                let text = text.unwrap_or_else(|| self.input.clone());
                let outcome = match self.process_event(Event::UserSubmit { text }) {
                    Ok(()) => SubmitOutcome::Accepted,
                    Err(TransitionError::Busy) => SubmitOutcome::Ignored(IgnoreReason::Busy),
                    Err(_) => SubmitOutcome::Ignored(IgnoreReason::EmptyInput),
                };
                if let SubmitOutcome::Ignored(reason) = outcome {
                    tracing::debug!(session_id = %self.context.session_id, ?reason, "Submit ignored");
                }
                let _ = ack.send(outcome);
            }
            Command::Cancel { ack } => {
                let _ = ack.send(self.process_event(Event::UserCancel).is_ok());
            }
            Command::Clear { ack } => {
                let _ = ack.send(self.process_event(Event::UserClear).is_ok());
            }
        }
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, &self.context, event)?;
        self.state = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendTurn(turn) => {
                self.store.append(turn);
            }

            Effect::ClearInput => self.input.clear(),

            Effect::IssueRequest {
                request_id,
                message,
            } => {
                self.context.next_request_id = request_id + 1;
                self.issue_request(request_id, message);
            }

            Effect::AbortRequest => {
                tracing::info!(session_id = %self.context.session_id, "Aborting chat request");
                if let Some(token) = self.request_cancel_token.take() {
                    token.cancel();
                }
            }

            Effect::ClearTranscript => self.store.clear(),

            Effect::PublishView => self.publish_view(),
        }
    }

    fn publish_view(&self) {
        self.view_tx.send_replace(SessionView {
            transcript: self.store.current(),
            lifecycle: self.state,
            input: self.input.clone(),
        });
    }

    fn issue_request(&mut self, request_id: u64, message: String) {
        // Context is captured once, at submit time
        let page_context = self
            .page_context
            .as_ref()
            .map(|provider| (*provider.snapshot()).clone());
        let request = ChatRequest::new(message, &self.store.current(), self.scope, page_context);

        let cancel_token = CancellationToken::new();
        if let Some(previous) = self.request_cancel_token.replace(cancel_token.clone()) {
            previous.cancel();
        }

        let backend = Arc::clone(&self.backend);
        let event_tx = self.event_tx.clone();
        let timeout = self.request_timeout;
        let session_id = self.context.session_id;

        tokio::spawn(async move {
            tracing::info!(
                %session_id,
                request_id,
                turns = request.conversation.len(),
                "Sending chat request"
            );

            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(%session_id, request_id, "Chat request cancelled");
                }

                result = tokio::time::timeout(timeout, backend.chat(&request)) => {
                    let event = match result {
                        Ok(Ok(reply)) => Event::ReplyReceived { request_id, reply },
                        Ok(Err(error)) => Event::RequestFailed { request_id, error },
                        Err(_) => {
                            tracing::warn!(%session_id, request_id, timeout_ms = %timeout.as_millis(), "Chat request timed out");
                            Event::RequestFailed {
                                request_id,
                                error: BackendError::timeout(format!(
                                    "request timed out after {}",
                                    format_duration(timeout)
                                )),
                            }
                        }
                    };
                    let _ = event_tx.send(event).await;
                }
            }
        });
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 && duration.as_secs() > 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
