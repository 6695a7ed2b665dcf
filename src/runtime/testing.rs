//! Mock backends for testing
//!
//! These mocks let the session runtime be exercised end to end without a
//! network.

use crate::backend::{BackendError, ChatBackend, ChatReply, ChatRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

// ============================================================================
// Mock Backend
// ============================================================================

/// Backend that answers with queued replies
#[derive(Default)]
pub struct MockBackend {
    responses: Mutex<VecDeque<Result<ChatReply, BackendError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, reply: ChatReply) {
        self.responses.lock().unwrap().push_back(Ok(reply));
    }

    /// Queue a failed reply
    pub fn queue_error(&self, error: BackendError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<ChatReply, BackendError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::network("No mock reply queued")))
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_response()
    }
}

// ============================================================================
// Gated Mock Backend (holds replies until released)
// ============================================================================

/// Backend whose replies wait for an explicit [`GatedMockBackend::release`]
pub struct GatedMockBackend {
    inner: MockBackend,
    gate: Semaphore,
    /// Notified when a request reaches the backend
    pub request_started: Arc<Notify>,
}

impl GatedMockBackend {
    pub fn new() -> Self {
        Self {
            inner: MockBackend::new(),
            gate: Semaphore::new(0),
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_reply(&self, reply: ChatReply) {
        self.inner.queue_reply(reply);
    }

    /// Let one waiting (or future) request complete
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl ChatBackend for GatedMockBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_waiters();
        self.gate.acquire().await.unwrap().forget();
        self.inner.next_response()
    }
}

// ============================================================================
// Delayed Mock Backend (for timeout testing)
// ============================================================================

/// Backend that sleeps before answering
pub struct DelayedMockBackend {
    inner: MockBackend,
    delay: Duration,
}

impl DelayedMockBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockBackend::new(),
            delay,
        }
    }

    pub fn queue_reply(&self, reply: ChatReply) {
        self.inner.queue_reply(reply);
    }
}

#[async_trait]
impl ChatBackend for DelayedMockBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.delay).await;
        self.inner.next_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::backend::{Scope, WireTurn};
    use crate::context::{ContextSynchronizer, FrameMessage, PageContext};
    use crate::conversation::Role;
    use crate::runtime::{
        mount, IgnoreReason, MountParams, SessionError, SessionHandle, SessionView,
        SubmitOutcome,
    };
    use crate::state_machine::Lifecycle;
    use serde_json::json;

    const HOST_ORIGIN: &str = "http://localhost:8088";

    async fn settle(handle: &SessionHandle) -> SessionView {
        tokio::time::timeout(Duration::from_secs(2), handle.settled())
            .await
            .expect("session did not settle")
            .unwrap()
    }

    fn contents(view: &SessionView) -> Vec<(Role, String)> {
        view.transcript
            .iter()
            .map(|t| (t.role(), t.content().to_string()))
            .collect()
    }

    fn sync_with(datasource: &str) -> Arc<ContextSynchronizer> {
        let sync = Arc::new(ContextSynchronizer::new(HOST_ORIGIN));
        update(&sync, datasource);
        sync
    }

    fn update(sync: &ContextSynchronizer, datasource: &str) {
        let context = PageContext {
            page: Some("explore".to_string()),
            datasource: Some(datasource.to_string()),
            ..PageContext::default()
        };
        assert!(sync.receive(&FrameMessage::context_update(HOST_ORIGIN, &context)));
    }

    #[tokio::test]
    async fn test_mock_backend() {
        let mock = MockBackend::new();
        mock.queue_reply(ChatReply::text("Hello"));

        let request = ChatRequest::new("hi", &[], Scope::default(), None);
        assert_eq!(mock.chat(&request).await.unwrap().message, "Hello");

        // Nothing queued
        assert!(mock.chat(&request).await.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_reply(
            ChatReply::text("Here you go")
                .with_actions(vec![json!({"type": "explore_link", "explore_url": "/explore/123"})]),
        );

        let handle = mount(MountParams::new(Scope::dataset(7)), Arc::clone(&backend));
        assert_eq!(
            handle.submit("Show me revenue").await.unwrap(),
            SubmitOutcome::Accepted
        );

        let view = settle(&handle).await;
        assert_eq!(
            contents(&view),
            vec![
                (Role::User, "Show me revenue".to_string()),
                (Role::Assistant, "Here you go".to_string()),
            ]
        );
        assert_eq!(
            view.transcript[1].actions(),
            &[Action::ExploreLink {
                url: "/explore/123".to_string()
            }]
        );

        let requests = backend.recorded_requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.message, "Show me revenue");
        assert_eq!(
            request.conversation,
            vec![WireTurn {
                role: Role::User,
                content: "Show me revenue".to_string()
            }]
        );
        assert_eq!(request.dataset_id, Some(7));
        assert_eq!(request.dashboard_id, None);
        assert!(request.page_context.is_none());
        assert!(!request.stream);
    }

    #[tokio::test]
    async fn test_turns_alternate() {
        let backend = Arc::new(MockBackend::new());
        let handle = mount(MountParams::new(Scope::default()), Arc::clone(&backend));

        for i in 0..5 {
            backend.queue_reply(ChatReply::text(format!("answer {i}")));
            assert_eq!(
                handle.submit(format!("question {i}")).await.unwrap(),
                SubmitOutcome::Accepted
            );
            settle(&handle).await;
        }

        let view = handle.view();
        assert_eq!(view.transcript.len(), 10);
        for (i, turn) in view.transcript.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role(), expected);
        }
    }

    #[tokio::test]
    async fn test_history_replayed_verbatim() {
        let backend = Arc::new(MockBackend::new());
        let handle = mount(MountParams::new(Scope::dashboard(3)), Arc::clone(&backend));

        for i in 0..3 {
            backend.queue_reply(ChatReply::text(format!("answer {i}")));
            handle.submit(format!("question {i}")).await.unwrap();
            settle(&handle).await;
        }

        let transcript = handle.view().transcript;
        let requests = backend.recorded_requests();
        for (n, request) in requests.iter().enumerate() {
            let expected: Vec<WireTurn> =
                transcript[..=2 * n].iter().map(WireTurn::from).collect();
            assert_eq!(request.conversation, expected);
            assert_eq!(request.dashboard_id, Some(3));
        }
    }

    #[tokio::test]
    async fn test_blank_submit_ignored() {
        let backend = Arc::new(MockBackend::new());
        let handle = mount(MountParams::new(Scope::default()), Arc::clone(&backend));

        for text in ["", "   ", "\n\t "] {
            assert_eq!(
                handle.submit(text).await.unwrap(),
                SubmitOutcome::Ignored(IgnoreReason::EmptyInput)
            );
        }
        assert!(handle.view().transcript.is_empty());
        assert!(backend.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_submit_while_pending_ignored() {
        let backend = Arc::new(GatedMockBackend::new());
        backend.queue_reply(ChatReply::text("first answer"));
        let handle = mount(MountParams::new(Scope::default()), Arc::clone(&backend));

        assert_eq!(handle.submit("first").await.unwrap(), SubmitOutcome::Accepted);
        assert!(handle.view().is_pending());
        assert_eq!(
            handle.submit("second").await.unwrap(),
            SubmitOutcome::Ignored(IgnoreReason::Busy)
        );

        backend.release();
        let view = settle(&handle).await;
        assert_eq!(
            contents(&view),
            vec![
                (Role::User, "first".to_string()),
                (Role::Assistant, "first answer".to_string()),
            ]
        );
        assert_eq!(backend.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_then_recovery() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_error(BackendError::status(500, None));
        backend.queue_reply(ChatReply::text("recovered"));
        let handle = mount(MountParams::new(Scope::default()), Arc::clone(&backend));

        handle.submit("q1").await.unwrap();
        let view = settle(&handle).await;
        assert_eq!(view.lifecycle, Lifecycle::Idle);
        assert_eq!(
            contents(&view),
            vec![
                (Role::User, "q1".to_string()),
                (Role::Assistant, "Error: HTTP 500".to_string()),
            ]
        );

        assert_eq!(handle.submit("q2").await.unwrap(), SubmitOutcome::Accepted);
        let view = settle(&handle).await;
        assert_eq!(view.transcript.len(), 4);
        assert_eq!(view.transcript[3].content(), "recovered");

        // Error turns are part of the replayed history
        let requests = backend.recorded_requests();
        assert_eq!(requests[1].conversation[1].content, "Error: HTTP 500");
    }

    #[tokio::test]
    async fn test_context_captured_at_submit() {
        let sync = sync_with("sales");
        let backend = Arc::new(GatedMockBackend::new());
        backend.queue_reply(ChatReply::text("one"));
        backend.queue_reply(ChatReply::text("two"));
        let params = MountParams::new(Scope::default()).with_context(sync.clone());
        let handle = mount(params, Arc::clone(&backend));

        handle.submit("first").await.unwrap();
        // Arrives while the first request is in flight
        update(&sync, "orders");
        backend.release();
        settle(&handle).await;

        handle.submit("second").await.unwrap();
        backend.release();
        settle(&handle).await;

        let requests = backend.recorded_requests();
        let datasource = |i: usize| {
            requests[i]
                .page_context
                .as_ref()
                .and_then(|c| c.datasource.clone())
        };
        assert_eq!(datasource(0).as_deref(), Some("sales"));
        assert_eq!(datasource(1).as_deref(), Some("orders"));
    }

    #[tokio::test]
    async fn test_foreign_context_not_used() {
        let sync = sync_with("sales");
        let forged = PageContext {
            datasource: Some("secrets".to_string()),
            ..PageContext::default()
        };
        assert!(!sync.receive(&FrameMessage::context_update("https://evil.example", &forged)));

        let backend = Arc::new(MockBackend::new());
        backend.queue_reply(ChatReply::text("ok"));
        let params = MountParams::new(Scope::default()).with_context(sync);
        let handle = mount(params, Arc::clone(&backend));
        handle.submit("q").await.unwrap();
        settle(&handle).await;

        let request = &backend.recorded_requests()[0];
        assert_eq!(
            request.page_context.as_ref().unwrap().datasource.as_deref(),
            Some("sales")
        );
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let backend = DelayedMockBackend::new(Duration::from_secs(5));
        backend.queue_reply(ChatReply::text("too late"));
        let params = MountParams::new(Scope::default()).with_timeout(Duration::from_millis(50));
        let handle = mount(params, backend);

        handle.submit("slow question").await.unwrap();
        let view = settle(&handle).await;
        assert_eq!(
            view.transcript[1].content(),
            "Error: request timed out after 50ms"
        );
    }

    #[tokio::test]
    async fn test_cancel_pending() {
        let backend = Arc::new(GatedMockBackend::new());
        backend.queue_reply(ChatReply::text("answer"));
        let handle = mount(MountParams::new(Scope::default()), Arc::clone(&backend));

        handle.submit("first").await.unwrap();
        assert!(handle.cancel().await.unwrap());

        let view = handle.view();
        assert_eq!(view.lifecycle, Lifecycle::Idle);
        assert_eq!(
            contents(&view),
            vec![
                (Role::User, "first".to_string()),
                (Role::Assistant, "Error: request cancelled".to_string()),
            ]
        );

        // Releasing the gate must not resurrect the cancelled reply
        backend.release();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.view().transcript.len(), 2);

        handle.submit("second").await.unwrap();
        let view = settle(&handle).await;
        assert_eq!(view.transcript.len(), 4);
        assert_eq!(view.transcript[3].content(), "answer");
    }

    #[tokio::test]
    async fn test_cancel_clear_resubmit_drops_late_reply() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_reply(ChatReply::text("answer to first"));
        backend.queue_reply(ChatReply::text("answer to second"));
        let handle = mount(MountParams::new(Scope::default()), Arc::clone(&backend));

        handle.submit("first").await.unwrap();
        // Queued back to back so the first reply can land behind them
        let (_, cleared, resubmitted) =
            tokio::join!(handle.cancel(), handle.clear(), handle.submit("second"));
        assert!(cleared.unwrap());
        assert_eq!(resubmitted.unwrap(), SubmitOutcome::Accepted);

        let view = settle(&handle).await;
        assert_eq!(
            contents(&view),
            vec![
                (Role::User, "second".to_string()),
                (Role::Assistant, "answer to second".to_string()),
            ]
        );

        let requests = backend.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].conversation.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_idle() {
        let handle = mount(MountParams::new(Scope::default()), MockBackend::new());
        assert!(!handle.cancel().await.unwrap());
        assert!(handle.view().transcript.is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let backend = Arc::new(GatedMockBackend::new());
        backend.queue_reply(ChatReply::text("a"));
        let handle = mount(MountParams::new(Scope::default()), Arc::clone(&backend));

        handle.submit("q").await.unwrap();
        // Refused while a request is in flight
        assert!(!handle.clear().await.unwrap());

        backend.release();
        assert_eq!(settle(&handle).await.transcript.len(), 2);

        assert!(handle.clear().await.unwrap());
        assert!(handle.view().transcript.is_empty());
    }

    #[tokio::test]
    async fn test_input_buffer() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_reply(ChatReply::text("Top 5 are..."));
        let handle = mount(MountParams::new(Scope::default()), Arc::clone(&backend));

        assert_eq!(
            handle.submit_input().await.unwrap(),
            SubmitOutcome::Ignored(IgnoreReason::EmptyInput)
        );

        handle.set_input("Top 5 products").await.unwrap();
        assert_eq!(
            handle.submit_input().await.unwrap(),
            SubmitOutcome::Accepted
        );
        assert!(handle.view().input.is_empty());

        let view = settle(&handle).await;
        assert_eq!(view.transcript[0].content(), "Top 5 products");
    }

    #[tokio::test]
    async fn test_view_notifications() {
        let backend = Arc::new(GatedMockBackend::new());
        backend.queue_reply(ChatReply::text("done"));
        let handle = mount(MountParams::new(Scope::default()), Arc::clone(&backend));
        let mut views = handle.subscribe();

        handle.submit("q").await.unwrap();
        views.changed().await.unwrap();
        {
            let view = views.borrow_and_update();
            assert!(view.is_pending());
            assert_eq!(view.transcript.len(), 1);
        }

        backend.release();
        views.changed().await.unwrap();
        let view = views.borrow_and_update();
        assert!(!view.is_pending());
        assert_eq!(view.transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_dispose() {
        let backend = Arc::new(GatedMockBackend::new());
        backend.queue_reply(ChatReply::text("never shown"));
        let mut handle = mount(MountParams::new(Scope::default()), Arc::clone(&backend));

        handle.submit("q").await.unwrap();
        handle.dispose().await;
        backend.release();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Final view is frozen where disposal found it
        let view = handle.view();
        assert!(view.is_pending());
        assert_eq!(view.transcript.len(), 1);

        assert_eq!(handle.submit("again").await, Err(SessionError::Disposed));
        assert_eq!(handle.cancel().await, Err(SessionError::Disposed));
        assert_eq!(handle.settled().await.unwrap_err(), SessionError::Disposed);
    }
}
