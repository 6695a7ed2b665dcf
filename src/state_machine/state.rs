//! Lifecycle state types

use serde::Serialize;
use uuid::Uuid;

/// Request lifecycle of one conversation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Idle,
    /// One request in flight, identified by `request_id`
    Pending { request_id: u64 },
}

impl Lifecycle {
    pub fn is_idle(self) -> bool {
        matches!(self, Lifecycle::Idle)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Lifecycle::Pending { .. })
    }
}

/// Read-only facts a transition may consult
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    /// Id the next request will carry. Only ever grows, clearing the
    /// transcript included, so a reply can never be mistaken for another's.
    pub next_request_id: u64,
}

impl SessionContext {
    pub fn new(session_id: Uuid, next_request_id: u64) -> Self {
        Self {
            session_id,
            next_request_id,
        }
    }
}
