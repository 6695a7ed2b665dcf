//! Pure state transition function

use super::{Effect, Event, Lifecycle, SessionContext};
use crate::action::normalize;
use crate::conversation::Turn;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: Lifecycle,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Lifecycle) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Events the current state does not accept. None of these are surfaced to
/// the user; the runtime drops the event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("A request is already in flight")]
    Busy,
    #[error("No request to cancel")]
    NothingToCancel,
    #[error("Reply for request {0} is no longer awaited")]
    StaleReply(u64),
}

/// Pure transition function
pub fn transition(
    state: &Lifecycle,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Idle + non-blank submit -> Pending, with the user turn echoed first
        (Lifecycle::Idle, Event::UserSubmit { text }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyInput);
            }
            let request_id = context.next_request_id;
            Ok(
                TransitionResult::new(Lifecycle::Pending { request_id }).with_effects([
                    Effect::AppendTurn(Turn::user(text.clone())),
                    Effect::ClearInput,
                    Effect::IssueRequest {
                        request_id,
                        message: text,
                    },
                    Effect::PublishView,
                ]),
            )
        }

        // At most one request in flight; extra submits are dropped, not queued
        (Lifecycle::Pending { .. }, Event::UserSubmit { .. } | Event::UserClear) => {
            Err(TransitionError::Busy)
        }

        (Lifecycle::Pending { request_id }, Event::ReplyReceived { request_id: answered, reply })
            if *request_id == answered =>
        {
            let actions = normalize(reply.actions.as_deref());
            Ok(TransitionResult::new(Lifecycle::Idle)
                .with_effect(Effect::AppendTurn(Turn::assistant(reply.message, actions)))
                .with_effect(Effect::PublishView))
        }

        (Lifecycle::Pending { request_id }, Event::RequestFailed { request_id: answered, error })
            if *request_id == answered =>
        {
            Ok(TransitionResult::new(Lifecycle::Idle)
                .with_effect(Effect::AppendTurn(Turn::error(&error)))
                .with_effect(Effect::PublishView))
        }

        // Cancelling still settles the turn with exactly one assistant reply
        (Lifecycle::Pending { .. }, Event::UserCancel) => {
            Ok(TransitionResult::new(Lifecycle::Idle).with_effects([
                Effect::AbortRequest,
                Effect::AppendTurn(Turn::error(crate::backend::BackendError::cancelled())),
                Effect::PublishView,
            ]))
        }

        (
            _,
            Event::ReplyReceived { request_id, .. } | Event::RequestFailed { request_id, .. },
        ) => Err(TransitionError::StaleReply(request_id)),

        (Lifecycle::Idle, Event::UserCancel) => Err(TransitionError::NothingToCancel),

        (Lifecycle::Idle, Event::UserClear) => Ok(TransitionResult::new(Lifecycle::Idle)
            .with_effects([Effect::ClearTranscript, Effect::PublishView])),
    }
}
