//! Effects produced by state transitions

use crate::conversation::Turn;

/// Effects to be executed, in order, after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Commit a turn to the conversation store
    AppendTurn(Turn),

    /// Empty the input buffer
    ClearInput,

    /// Build the request from the store and context snapshot, then send it
    IssueRequest { request_id: u64, message: String },

    /// Abort the in-flight request
    AbortRequest,

    /// Drop the whole transcript
    ClearTranscript,

    /// Push the current view to subscribers
    PublishView,
}
