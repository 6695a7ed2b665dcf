//! Presentation of session views
//!
//! Rendering is a pure function of a [`SessionView`](crate::runtime::SessionView)
//! and the page context. The only input a view feeds back into a session is
//! the edited input buffer and the submit gesture.

mod page;
mod panel;

pub use page::PageView;
pub use panel::PanelView;

use crate::action::Action;
use crate::conversation::{Role, Turn};
use std::fmt::Write as _;

/// Indicator shown while a request is in flight
pub const THINKING: &str = "Thinking…";

/// Key identity, independent of any terminal or toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Backspace,
    Char(char),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self { key, shift: false }
    }

    pub fn shifted(key: Key) -> Self {
        Self { key, shift: true }
    }
}

/// What a key press asks the host to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Submit,
    InsertNewline,
    None,
}

/// Enter submits; Shift+Enter inserts a literal newline.
pub fn handle_key(event: KeyEvent) -> KeyAction {
    match (event.key, event.shift) {
        (Key::Enter, false) => KeyAction::Submit,
        (Key::Enter, true) => KeyAction::InsertNewline,
        _ => KeyAction::None,
    }
}

/// Apply a key press to a local input buffer. Returns true when the caller
/// should submit the buffer; the buffer itself is left for the session to
/// clear once the submit is accepted.
pub fn apply_key(buffer: &mut String, event: KeyEvent) -> bool {
    match handle_key(event) {
        KeyAction::Submit => return true,
        KeyAction::InsertNewline => buffer.push('\n'),
        KeyAction::None => match event.key {
            Key::Char(c) => buffer.push(c),
            Key::Backspace => {
                buffer.pop();
            }
            Key::Enter | Key::Other => {}
        },
    }
    false
}

/// Link text for an action
pub fn action_label(action: &Action) -> String {
    match action {
        Action::ExploreLink { .. } => "Open in Explore".to_string(),
        Action::ChartCreated { name, .. } if name.is_empty() => "View Chart".to_string(),
        Action::ChartCreated { name, .. } => format!("View Chart: {name}"),
        Action::DashboardCreated { title, .. } if title.is_empty() => {
            "View Dashboard".to_string()
        }
        Action::DashboardCreated { title, .. } => format!("View Dashboard: {title}"),
    }
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    }
}

/// Write one turn as a labelled block, followed by its action links
fn render_turn(out: &mut String, turn: &Turn) {
    let _ = writeln!(out, "{}:", speaker(turn.role()));
    for line in turn.content().lines() {
        let _ = writeln!(out, "  {line}");
    }
    render_actions(out, turn.actions());
}

fn render_actions(out: &mut String, actions: &[Action]) {
    for action in actions {
        let _ = writeln!(out, "  -> {} <{}>", action_label(action), action.url());
    }
}
