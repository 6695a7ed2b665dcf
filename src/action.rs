//! Result actions attached to assistant turns
//!
//! The backend declares actions as loosely typed JSON objects with a `type`
//! tag. Each descriptor is decoded on its own so one malformed or unknown
//! entry never costs the rest of the reply.

use serde::Deserialize;
use serde_json::Value;

/// Renderable affordance attached to an assistant turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ExploreLink { url: String },
    ChartCreated { url: String, name: String },
    DashboardCreated { url: String, title: String },
}

impl Action {
    pub fn url(&self) -> &str {
        match self {
            Action::ExploreLink { url }
            | Action::ChartCreated { url, .. }
            | Action::DashboardCreated { url, .. } => url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::ExploreLink { .. } => "explore_link",
            Action::ChartCreated { .. } => "chart_created",
            Action::DashboardCreated { .. } => "dashboard_created",
        }
    }
}

/// Wire form of an action as declared by the backend
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ActionDescriptor {
    ExploreLink {
        explore_url: Option<String>,
    },
    ChartCreated {
        chart_url: Option<String>,
        chart_name: Option<String>,
    },
    DashboardCreated {
        dashboard_url: Option<String>,
        dashboard_title: Option<String>,
    },
    /// Action kinds this client does not know about yet
    #[serde(other)]
    Unknown,
}

impl ActionDescriptor {
    fn into_action(self) -> Option<Action> {
        match self {
            ActionDescriptor::ExploreLink { explore_url } => {
                Some(Action::ExploreLink { url: required(explore_url)? })
            }
            ActionDescriptor::ChartCreated {
                chart_url,
                chart_name,
            } => Some(Action::ChartCreated {
                url: required(chart_url)?,
                name: chart_name.unwrap_or_default(),
            }),
            ActionDescriptor::DashboardCreated {
                dashboard_url,
                dashboard_title,
            } => Some(Action::DashboardCreated {
                url: required(dashboard_url)?,
                title: dashboard_title.unwrap_or_default(),
            }),
            ActionDescriptor::Unknown => None,
        }
    }
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

/// Map backend action descriptors to renderable actions.
///
/// Absent input is treated as empty. Unknown kinds and descriptors missing
/// their URL are dropped. Output order follows input order.
pub fn normalize(descriptors: Option<&[Value]>) -> Vec<Action> {
    let Some(descriptors) = descriptors else {
        return Vec::new();
    };

    descriptors
        .iter()
        .filter_map(|raw| match ActionDescriptor::deserialize(raw) {
            Ok(descriptor) => {
                let action = descriptor.into_action();
                if action.is_none() {
                    tracing::debug!(descriptor = %raw, "Dropping unrenderable action");
                }
                action
            }
            Err(e) => {
                tracing::debug!(error = %e, "Dropping undecodable action");
                None
            }
        })
        .collect()
}
