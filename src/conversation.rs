//! Conversation transcript
//!
//! The store is append-only: every snapshot handed out is an immutable
//! `Arc<[Turn]>`, so a transcript captured for a request can never observe a
//! later append.

use crate::action::Action;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    role: Role,
    content: String,
    actions: Vec<Action>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            actions: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            actions,
        }
    }

    /// Synthetic assistant turn describing a failed request
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::assistant(format!("Error: {message}"), Vec::new())
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Always empty for user turns
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

/// Immutable snapshot of the conversation
pub type Transcript = Arc<[Turn]>;

/// Ordered, append-only log of turns
#[derive(Debug, Clone)]
pub struct ConversationStore {
    turns: Transcript,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            turns: Arc::from(Vec::new()),
        }
    }

    /// Append a turn and return the full updated sequence.
    pub fn append(&mut self, turn: Turn) -> Transcript {
        let next: Transcript = self
            .turns
            .iter()
            .cloned()
            .chain(std::iter::once(turn))
            .collect();
        self.turns = next;
        self.current()
    }

    pub fn current(&self) -> Transcript {
        Arc::clone(&self.turns)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop the whole transcript. Individual turns cannot be removed.
    pub fn clear(&mut self) {
        self.turns = Arc::from(Vec::new());
    }
}
