//! Intent triage: decide what the agent does with the latest message.

use parley_core::{
    context::Context,
    model::{Message, Project},
};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{render_transcript, Gateway};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Intent {
    SimpleResponse,
    OnboardingFlow,
    NoReply,
    ProjectFlow(ProjectRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ProjectAction {
    Create,
    Update,
    Complete,
    Reference,
}

impl ProjectAction {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "complete" => Some(Self::Complete),
            "reference" => Some(Self::Reference),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct ProjectRequest {
    pub action: ProjectAction,
    pub project_name: Option<String>,
    pub description: Option<String>,
    pub attribute_updates: Option<Map<String, Value>>,
    pub replace_attributes: bool,
}

/// Normalize a message for trigger-phrase comparison: trim, lowercase,
/// collapse whitespace, strip trailing `.!?`.
pub(super) fn normalize_phrase(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(['.', '!', '?'])
        .trim_end()
        .to_string()
}

/// True when `text` is exactly the configured trigger phrase.
pub(super) fn matches_trigger(text: &str, trigger: &str) -> bool {
    let trigger = normalize_phrase(trigger);
    !trigger.is_empty() && normalize_phrase(text) == trigger
}

/// Slice from the first `{` to the last `}`. Tolerates prose and code fences
/// around the object.
pub(super) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a classifier reply. Anything unusable is a simple response.
pub(super) fn parse_intent(raw: &str) -> Intent {
    let Some(json) = extract_json_object(raw) else {
        return Intent::SimpleResponse;
    };
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(json) else {
        return Intent::SimpleResponse;
    };

    let tag = obj
        .get("intent")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match tag.as_str() {
        "simple_response" => Intent::SimpleResponse,
        "onboarding_flow" => Intent::OnboardingFlow,
        "no_reply" => Intent::NoReply,
        "project_flow" => {
            let Some(action) = obj
                .get("action")
                .and_then(Value::as_str)
                .and_then(ProjectAction::parse)
            else {
                return Intent::SimpleResponse;
            };
            Intent::ProjectFlow(ProjectRequest {
                action,
                project_name: non_empty_str(obj.get("project_name")),
                description: non_empty_str(obj.get("description")),
                attribute_updates: obj
                    .get("attribute_updates")
                    .and_then(Value::as_object)
                    .filter(|m| !m.is_empty())
                    .cloned(),
                replace_attributes: obj
                    .get("replace_attributes")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        }
        _ => Intent::SimpleResponse,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn render_projects(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "Known projects: none".to_string();
    }
    let mut out = String::from("Known projects:");
    for p in projects {
        let status = if p.is_live { "live" } else { "completed" };
        out.push_str(&format!("\n- {} ({status})", p.name));
        if let Some(desc) = p.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!(": {desc}"));
        }
    }
    out
}

impl Gateway {
    /// Classify the latest message. Provider failure degrades to a simple
    /// response.
    pub(super) async fn classify(
        &self,
        recent: &[Message],
        projects: &[Project],
        cancel: &CancellationToken,
    ) -> Intent {
        let system = format!("{}\n\n{}", self.prompts.triage, render_projects(projects));
        let context =
            Context::with_history(&system, Vec::new(), &render_transcript(recent)).json();

        match self.reason(&context, cancel).await {
            Ok(raw) => {
                let intent = parse_intent(&raw);
                debug!("triage: {intent:?}");
                intent
            }
            Err(e) => {
                warn!("triage failed, defaulting to simple response: {e}");
                Intent::SimpleResponse
            }
        }
    }
}
