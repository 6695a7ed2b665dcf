//! Full-page chat view

use super::{render_turn, THINKING};
use crate::context::PageContext;
use crate::runtime::SessionView;
use std::fmt::Write as _;

const TITLE: &str = "Ask Data";
const SUBTITLE: &str = "Explore your data and create charts using natural language.";
const EXAMPLE_QUESTIONS: [&str; 3] = [
    "Show me total revenue by month for 2024",
    "Which products have the highest return rate?",
    "Create a bar chart of signups by country",
];
const INPUT_HINT: &str = "Ask about your data… (Enter to send, Shift+Enter for newline)";

/// Full-page presentation
#[derive(Debug, Clone, Copy, Default)]
pub struct PageView;

impl PageView {
    pub fn render(&self, view: &SessionView, context: &PageContext) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{TITLE}");
        let _ = writeln!(out, "{SUBTITLE}");
        if let Some(badge) = context_badge(context) {
            let _ = writeln!(out, "{badge}");
        }
        out.push('\n');

        if view.transcript.is_empty() {
            out.push_str("Ask a question about your data to get started.\n");
            out.push_str("Examples:\n");
            for question in EXAMPLE_QUESTIONS {
                let _ = writeln!(out, "  \"{question}\"");
            }
        }

        for turn in view.transcript.iter() {
            render_turn(&mut out, turn);
        }

        if view.is_pending() {
            let _ = writeln!(out, "{THINKING}");
        } else {
            let _ = writeln!(out, "\n{INPUT_HINT}");
        }
        out
    }
}

/// Dashboard context wins over dataset context
fn context_badge(context: &PageContext) -> Option<String> {
    match (&context.dashboard, &context.datasource) {
        (Some(dashboard), _) => Some(format!("Context: Dashboard — {dashboard}")),
        (None, Some(datasource)) => Some(format!("Context: Dataset — {datasource}")),
        (None, None) => None,
    }
}
