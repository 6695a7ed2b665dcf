//! Events that drive the lifecycle

use crate::backend::{BackendError, ChatReply};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserSubmit { text: String },
    UserCancel,
    UserClear,

    // Backend events, tagged with the request they answer
    ReplyReceived { request_id: u64, reply: ChatReply },
    RequestFailed { request_id: u64, error: BackendError },
}
