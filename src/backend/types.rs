//! Wire types for the chat backend

use crate::context::PageContext;
use crate::conversation::{Role, Turn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Analytic object a conversation is bound to. Fixed for a session's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scope {
    pub dataset_id: Option<i64>,
    pub dashboard_id: Option<i64>,
}

impl Scope {
    pub fn dataset(id: i64) -> Self {
        Self {
            dataset_id: Some(id),
            dashboard_id: None,
        }
    }

    pub fn dashboard(id: i64) -> Self {
        Self {
            dataset_id: None,
            dashboard_id: Some(id),
        }
    }
}

/// Transcript entry as sent to the backend. Actions are never replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for WireTurn {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role(),
            content: turn.content().to_string(),
        }
    }
}

/// Body of `POST {prefix}/chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation: Vec<WireTurn>,
    pub dataset_id: Option<i64>,
    pub dashboard_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_context: Option<PageContext>,
    pub stream: bool,
}

impl ChatRequest {
    /// `transcript` must already end with the user turn carrying `message`.
    pub fn new(
        message: impl Into<String>,
        transcript: &[Turn],
        scope: Scope,
        page_context: Option<PageContext>,
    ) -> Self {
        Self {
            message: message.into(),
            conversation: transcript.iter().map(WireTurn::from).collect(),
            dataset_id: scope.dataset_id,
            dashboard_id: scope.dashboard_id,
            page_context,
            stream: false,
        }
    }
}

/// Successful chat reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    /// Raw action descriptors; absent and null both mean none
    #[serde(default)]
    pub actions: Option<Vec<Value>>,
}

impl ChatReply {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            actions: None,
        }
    }

    pub fn with_actions(mut self, actions: Vec<Value>) -> Self {
        self.actions = Some(actions);
        self
    }
}

/// Structured action the server runs on the user's behalf, such as
/// `create_chart`, `create_dashboard` or `run_sql`. The payload is passed
/// through untouched; the server validates it per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl ExecuteAction {
    pub fn new(kind: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Body of `POST {prefix}/execute`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ExecuteRequest<'a> {
    pub action: &'a ExecuteAction,
}

/// Answer of `POST {prefix}/execute`. A failed action is still a 2xx
/// answer, with `success` false and `error` set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExecuteResult {
    pub success: bool,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
}

/// Non-sensitive plugin settings from `GET {prefix}/config`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub streaming_enabled: bool,
    #[serde(default)]
    pub max_datasets_in_context: u32,
}

/// Column metadata of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Dataset visible to the current user
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetSummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

/// Body of `GET {prefix}/context`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DatasetListing {
    #[serde(default)]
    pub datasets: Vec<DatasetSummary>,
}

/// Error body the server may attach to a non-2xx answer
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<Value>,
}

impl ErrorBody {
    pub fn detail(&self) -> Option<String> {
        match self.message.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
