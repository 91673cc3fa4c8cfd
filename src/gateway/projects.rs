//! Project lifecycle: phrase-driven resolver and the classifier's project flow.

use parley_core::{
    error::ParleyError,
    model::{Project, ProjectEvent},
};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{
    triage::{ProjectAction, ProjectRequest},
    Gateway,
};

const CREATE_TRIGGERS: &[&str] = &[
    "start a new project",
    "new project:",
    "start project",
    "create a project",
    "create project",
    "let's start a project",
];

const COMPLETE_TRIGGERS: &[&str] = &[
    "project is complete",
    "project is done",
    "finished the project",
    "complete the project",
    "mark the project as done",
    "mark project complete",
    "close the project",
];

const NAME_MARKERS: &[&str] = &[" called ", " named ", ":"];

pub(super) const DEFAULT_PROJECT_NAME: &str = "New project";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ProjectIntent {
    ContinueCurrent,
    Complete { project_id: Option<String> },
    Reference(String),
    StartNew { name: String },
}

/// An action the resolver already carried out this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct AppliedAction {
    pub action: ProjectAction,
    pub project_id: String,
}

/// Text after `called`, `named` or `:`, with quotes and trailing punctuation
/// stripped.
pub(super) fn extract_name(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let (pos, marker) = NAME_MARKERS
        .iter()
        .filter_map(|m| lower.find(m).map(|pos| (pos, *m)))
        .min_by_key(|(pos, _)| *pos)?;
    let name = text[pos + marker.len()..]
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’'))
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Live project whose name appears in `text`; the longest name wins.
fn mentioned_live_project<'a>(text: &str, projects: &'a [Project]) -> Option<&'a Project> {
    let lower = text.to_lowercase();
    projects
        .iter()
        .filter(|p| p.is_live && !p.name.trim().is_empty())
        .filter(|p| lower.contains(&p.name.to_lowercase()))
        .max_by_key(|p| p.name.len())
}

/// Whether `phrase` occurs in `lower` as whole words: not glued to a letter
/// or digit on either side.
fn contains_phrase(lower: &str, phrase: &str) -> bool {
    lower.match_indices(phrase).any(|(pos, _)| {
        let before = lower[..pos].chars().next_back();
        let after = lower[pos + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn single_live(projects: &[Project]) -> Option<&Project> {
    let mut live = projects.iter().filter(|p| p.is_live);
    match (live.next(), live.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Find the project `name` refers to.
///
/// Exact case-insensitive match first, then substring either way, live
/// projects preferred in both passes. Without a usable name, non-create
/// actions fall back to the only live project when there is exactly one.
pub(super) fn match_project<'a>(
    name: Option<&str>,
    projects: &'a [Project],
    action: ProjectAction,
) -> Option<&'a Project> {
    let wanted = name.map(|n| n.trim().to_lowercase()).unwrap_or_default();

    if !wanted.is_empty() {
        let exact = |p: &&Project| p.name.to_lowercase() == wanted;
        if let Some(p) = projects
            .iter()
            .filter(exact)
            .find(|p| p.is_live)
            .or_else(|| projects.iter().find(exact))
        {
            return Some(p);
        }

        let fuzzy = |p: &&Project| {
            let have = p.name.to_lowercase();
            !have.is_empty() && (have.contains(&wanted) || wanted.contains(&have))
        };
        if let Some(p) = projects
            .iter()
            .filter(fuzzy)
            .find(|p| p.is_live)
            .or_else(|| projects.iter().find(fuzzy))
        {
            return Some(p);
        }
    }

    if action == ProjectAction::Create {
        return None;
    }
    single_live(projects)
}

/// Conservative phrase resolver over the latest message.
pub(super) fn resolve(latest: &str, projects: &[Project]) -> ProjectIntent {
    let lower = latest.to_lowercase();

    if CREATE_TRIGGERS.iter().any(|t| contains_phrase(&lower, t)) {
        let name = extract_name(latest).unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
        return ProjectIntent::StartNew { name };
    }

    if COMPLETE_TRIGGERS.iter().any(|t| contains_phrase(&lower, t)) {
        let project = match extract_name(latest) {
            Some(name) => match_project(Some(&name), projects, ProjectAction::Complete),
            None => mentioned_live_project(latest, projects)
                .or_else(|| single_live(projects)),
        };
        return ProjectIntent::Complete {
            project_id: project.map(|p| p.id.clone()),
        };
    }

    if let Some(p) = mentioned_live_project(latest, projects) {
        return ProjectIntent::Reference(p.id.clone());
    }

    ProjectIntent::ContinueCurrent
}

impl Gateway {
    /// Carry out the resolver's side effects. Returns the action applied, if any.
    pub(super) async fn apply_resolution(
        &self,
        chat_id: &str,
        intent: &ProjectIntent,
    ) -> Result<Option<AppliedAction>, ParleyError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        match intent {
            ProjectIntent::ContinueCurrent | ProjectIntent::Complete { project_id: None } => {
                Ok(None)
            }
            ProjectIntent::StartNew { name } => {
                let project = store.create_project(chat_id, name, None).await?;
                store
                    .log_project_event(
                        &project.id,
                        ProjectEvent::Created,
                        Some(&json!({ "name": name, "source": "resolver" })),
                    )
                    .await?;
                info!("[{chat_id}] project created: {name}");
                Ok(Some(AppliedAction {
                    action: ProjectAction::Create,
                    project_id: project.id,
                }))
            }
            ProjectIntent::Complete {
                project_id: Some(id),
            } => {
                store.set_project_live(id, false).await?;
                store
                    .log_project_event(id, ProjectEvent::Completed, Some(&json!({ "source": "resolver" })))
                    .await?;
                info!("[{chat_id}] project completed: {id}");
                Ok(Some(AppliedAction {
                    action: ProjectAction::Complete,
                    project_id: id.clone(),
                }))
            }
            ProjectIntent::Reference(id) => {
                store
                    .log_project_event(id, ProjectEvent::Referenced, Some(&json!({ "source": "resolver" })))
                    .await?;
                Ok(Some(AppliedAction {
                    action: ProjectAction::Reference,
                    project_id: id.clone(),
                }))
            }
        }
    }

    /// Apply a classifier project request. Returns a short note describing
    /// what happened, for the confirmation reply.
    pub(super) async fn apply_project_request(
        &self,
        chat_id: &str,
        request: &ProjectRequest,
        projects: &[Project],
        already: Option<&AppliedAction>,
    ) -> Result<String, ParleyError> {
        let Some(store) = &self.store else {
            return Ok("Projects are unavailable right now.".to_string());
        };
        let name = request.project_name.as_deref();

        if request.action == ProjectAction::Create {
            let created_now = already.filter(|a| a.action == ProjectAction::Create);
            if let Some(existing) = name.and_then(|n| {
                projects.iter().find(|p| {
                    p.is_live
                        && p.name.eq_ignore_ascii_case(n.trim())
                        && !created_now.is_some_and(|a| a.project_id == p.id)
                })
            }) {
                store
                    .log_project_event(&existing.id, ProjectEvent::Referenced, None)
                    .await?;
                return Ok(format!("Project \"{}\" already exists and is live.", existing.name));
            }

            let (project_id, project_name) = match created_now {
                Some(applied) => {
                    if let Some(n) = name {
                        store
                            .update_project(&applied.project_id, Some(n), request.description.as_deref())
                            .await?;
                    }
                    let current = projects
                        .iter()
                        .find(|p| p.id == applied.project_id)
                        .map(|p| p.name.as_str());
                    (
                        applied.project_id.clone(),
                        name.or(current).unwrap_or(DEFAULT_PROJECT_NAME).to_string(),
                    )
                }
                None => {
                    let n = name.unwrap_or(DEFAULT_PROJECT_NAME);
                    let project = store
                        .create_project(chat_id, n, request.description.as_deref())
                        .await?;
                    store
                        .log_project_event(
                            &project.id,
                            ProjectEvent::Created,
                            Some(&json!({ "name": n, "source": "triage" })),
                        )
                        .await?;
                    (project.id, n.to_string())
                }
            };
            if let Some(attrs) = &request.attribute_updates {
                store
                    .merge_project_attributes(&project_id, &Value::Object(attrs.clone()), false)
                    .await?;
            }
            return Ok(format!("Created project \"{project_name}\"."));
        }

        let Some(project) = match_project(name, projects, request.action) else {
            warn!("[{chat_id}] no project matches {:?}", name.unwrap_or_default());
            return Ok(match name {
                Some(n) => format!("There is no project called \"{n}\"."),
                None => "It is not clear which project is meant.".to_string(),
            });
        };

        let repeated = already
            .is_some_and(|a| a.action == request.action && a.project_id == project.id);

        match request.action {
            ProjectAction::Update => {
                if request.description.is_some() {
                    store
                        .update_project(&project.id, None, request.description.as_deref())
                        .await?;
                }
                if let Some(attrs) = &request.attribute_updates {
                    store
                        .merge_project_attributes(
                            &project.id,
                            &Value::Object(attrs.clone()),
                            request.replace_attributes,
                        )
                        .await?;
                }
                store
                    .log_project_event(
                        &project.id,
                        ProjectEvent::Updated,
                        Some(&json!({
                            "attributes": request.attribute_updates,
                            "replace": request.replace_attributes,
                        })),
                    )
                    .await?;
                Ok(format!("Updated project \"{}\".", project.name))
            }
            ProjectAction::Complete => {
                if !repeated {
                    store.set_project_live(&project.id, false).await?;
                    store
                        .log_project_event(&project.id, ProjectEvent::Completed, Some(&json!({ "source": "triage" })))
                        .await?;
                }
                Ok(format!("Marked project \"{}\" as complete.", project.name))
            }
            ProjectAction::Reference | ProjectAction::Create => {
                if !repeated {
                    store
                        .log_project_event(&project.id, ProjectEvent::Referenced, None)
                        .await?;
                }
                Ok(format!("The conversation is about project \"{}\".", project.name))
            }
        }
    }
}
