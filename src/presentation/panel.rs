//! Floating panel chat view

use super::{render_turn, THINKING};
use crate::backend::Scope;
use crate::runtime::SessionView;
use std::fmt::Write as _;

const LAUNCHER: &str = "[Ask Data]";

/// Floating panel presentation. Closed, only the launcher is shown.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelView {
    open: bool,
    dataset_scoped: bool,
}

impl PanelView {
    pub fn new(scope: Scope) -> Self {
        Self {
            open: false,
            dataset_scoped: scope.dataset_id.is_some(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn toggle(&mut self) {
        self.open = !self.open;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    fn placeholder(&self) -> &'static str {
        if self.dataset_scoped {
            "Ask a question about this dataset…"
        } else {
            "Ask a question about your data…"
        }
    }

    pub fn render(&self, view: &SessionView) -> String {
        if !self.open {
            return format!("{LAUNCHER}\n");
        }

        let mut out = String::from("Ask Data [x]\n");
        if view.transcript.is_empty() {
            let _ = writeln!(out, "{}", self.placeholder());
        }
        for turn in view.transcript.iter() {
            render_turn(&mut out, turn);
        }
        if view.is_pending() {
            let _ = writeln!(out, "{THINKING}");
        }
        out
    }
}
