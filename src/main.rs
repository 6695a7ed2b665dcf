//! Ask Data terminal host
//!
//! Line-mode front end for a chat session. A line ending in `\` continues
//! the question on the next line; slash commands drive the session.

use ask_data::backend::{ChatBackend, ExecuteAction, HttpBackend, LoggingBackend};
use ask_data::config::ClientConfig;
use ask_data::context::{ContextProvider, ContextSynchronizer, FrameMessage, PageContext};
use ask_data::presentation::{apply_key, Key, KeyEvent, PageView};
use ask_data::runtime::{mount, IgnoreReason, MountParams, SessionView, SubmitOutcome};
use ask_data::state_machine::Lifecycle;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, WatchStream};
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str =
    "Commands: /context <json>, /execute <type> [json], /cancel, /clear, /config, /datasets, /quit";

/// One complete unit of terminal input
#[derive(Debug, PartialEq)]
enum Input {
    Question(String),
    Context(String),
    Execute(String),
    Cancel,
    Clear,
    Config,
    Datasets,
    Quit,
    Unknown(String),
}

/// Accumulates continuation lines into one question
#[derive(Debug, Default)]
struct LineEditor {
    buffer: String,
}

impl LineEditor {
    /// Feed one raw line. Returns `None` while a continued question is
    /// still being typed.
    fn feed(&mut self, line: &str) -> Option<Input> {
        if self.buffer.is_empty() {
            if let Some(command) = line.trim_start().strip_prefix('/') {
                return Some(parse_command(command));
            }
        }

        let (text, continued) = match line.strip_suffix('\\') {
            Some(text) => (text, true),
            None => (line, false),
        };
        for c in text.chars() {
            apply_key(&mut self.buffer, KeyEvent::new(Key::Char(c)));
        }

        if continued {
            apply_key(&mut self.buffer, KeyEvent::shifted(Key::Enter));
            None
        } else if apply_key(&mut self.buffer, KeyEvent::new(Key::Enter)) {
            Some(Input::Question(std::mem::take(&mut self.buffer)))
        } else {
            None
        }
    }
}

fn parse_command(command: &str) -> Input {
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .unwrap_or((command, ""));
    match name {
        "context" => Input::Context(rest.trim().to_string()),
        "execute" => Input::Execute(rest.trim().to_string()),
        "cancel" => Input::Cancel,
        "clear" => Input::Clear,
        "config" => Input::Config,
        "datasets" => Input::Datasets,
        "quit" | "exit" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    }
}

/// Build the frame message for `/context`. A bare object is treated as the
/// page context payload; anything with a `type` is passed through.
fn context_message(origin: &str, raw: &str) -> Result<FrameMessage, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    if value.get("type").is_some() {
        return Ok(FrameMessage::new(origin, value));
    }
    let context: PageContext = serde_json::from_value(value)?;
    Ok(FrameMessage::context_update(origin, &context))
}

/// Parse `/execute <type> [payload]`. The payload must be a JSON object
/// and defaults to empty.
fn execute_action(raw: &str) -> Result<ExecuteAction, String> {
    let (kind, payload) = raw
        .split_once(char::is_whitespace)
        .unwrap_or((raw, ""));
    if kind.is_empty() {
        return Err("missing action type".to_string());
    }
    let payload = match payload.trim() {
        "" => Map::new(),
        json => serde_json::from_str(json).map_err(|e| format!("invalid payload: {e}"))?,
    };
    Ok(ExecuteAction::new(kind, payload))
}

/// Decides whether a new view or context snapshot changes what is on screen
#[derive(Debug, Default)]
struct RedrawGate {
    last: Option<(usize, Lifecycle, Arc<PageContext>)>,
}

impl RedrawGate {
    fn should_redraw(&mut self, view: &SessionView, context: &Arc<PageContext>) -> bool {
        // Input-buffer edits alone don't warrant a redraw
        let unchanged = self.last.as_ref().is_some_and(|(len, lifecycle, shown)| {
            *len == view.transcript.len() && *lifecycle == view.lifecycle && **shown == **context
        });
        if unchanged {
            return false;
        }
        self.last = Some((view.transcript.len(), view.lifecycle, Arc::clone(context)));
        true
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ask_data=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    let origin = config.origin()?;
    let http = Arc::new(HttpBackend::new(&config)?);
    tracing::info!(api_root = %config.api_root(), %origin, "Client configured");

    // Host frame messages arrive on this channel
    let sync = Arc::new(ContextSynchronizer::new(origin.clone()));
    let (frame_tx, frame_rx) = mpsc::channel(16);
    let listener = sync.listen(ReceiverStream::new(frame_rx));

    let backend = LoggingBackend::new(Arc::clone(&http) as Arc<dyn ChatBackend>);
    let params = MountParams::new(config.scope())
        .with_context(Arc::clone(&sync) as Arc<dyn ContextProvider>)
        .with_timeout(config.request_timeout);
    let mut handle = mount(params, backend);

    let mut view = handle.view();
    let mut context = sync.snapshot();
    let mut views = WatchStream::new(handle.subscribe());
    let mut contexts = WatchStream::new(sync.subscribe());
    let renderer = tokio::spawn(async move {
        let mut gate = RedrawGate::default();
        loop {
            tokio::select! {
                next = views.next() => match next {
                    Some(next) => view = next,
                    None => break,
                },
                Some(next) = contexts.next() => context = next,
            }
            if gate.should_redraw(&view, &context) {
                render(&view, &context);
            }
        }
    });

    eprintln!("{HELP}");
    let mut editor = LineEditor::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let Some(input) = editor.feed(&line) else {
            continue;
        };

        match input {
            Input::Question(text) => {
                handle.set_input(text).await?;
                match handle.submit_input().await? {
                    SubmitOutcome::Accepted => {}
                    SubmitOutcome::Ignored(IgnoreReason::Busy) => {
                        eprintln!("Still waiting for the previous answer (/cancel to abort)");
                    }
                    SubmitOutcome::Ignored(IgnoreReason::EmptyInput) => {}
                }
            }
            Input::Context(raw) => match context_message(&origin, &raw) {
                Ok(message) => {
                    if frame_tx.send(message).await.is_err() {
                        eprintln!("Context listener has stopped");
                    }
                }
                Err(e) => eprintln!("Invalid context JSON: {e}"),
            },
            Input::Execute(raw) => match execute_action(&raw) {
                Ok(action) => match http.execute(&action).await {
                    Ok(result) if result.success => println!("{}", result.result),
                    Ok(result) => eprintln!(
                        "Action failed: {}",
                        result.error.as_deref().unwrap_or("unknown error")
                    ),
                    Err(e) => eprintln!("Error: {e}"),
                },
                Err(e) => eprintln!("Usage: /execute <type> [json object] ({e})"),
            },
            Input::Cancel => {
                if !handle.cancel().await? {
                    eprintln!("Nothing to cancel");
                }
            }
            Input::Clear => {
                if !handle.clear().await? {
                    eprintln!("Cannot clear while a request is in flight");
                }
            }
            Input::Config => match http.plugin_config().await {
                Ok(plugin) => println!(
                    "Model: {} | streaming: {} | max datasets in context: {}",
                    plugin.model, plugin.streaming_enabled, plugin.max_datasets_in_context
                ),
                Err(e) => eprintln!("Error: {e}"),
            },
            Input::Datasets => match http.datasets().await {
                Ok(datasets) => {
                    for dataset in datasets {
                        println!("{:>6}  {} ({} columns)", dataset.id, dataset.name, dataset.columns.len());
                    }
                }
                Err(e) => eprintln!("Error: {e}"),
            },
            Input::Quit => break,
            Input::Unknown(name) => eprintln!("Unknown command /{name}. {HELP}"),
        }
    }

    handle.dispose().await;
    listener.shutdown().await;
    let _ = renderer.await;
    Ok(())
}

fn render(view: &SessionView, context: &PageContext) {
    println!("\n{}", PageView.render(view, context));
}
