//! Project records and their audit trail.

use super::{parse_json_object, SqliteStore};
use parley_core::{
    error::ParleyError,
    model::{merge_json, Project, ProjectEvent},
};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

type ProjectRow = (
    String,
    String,
    String,
    Option<String>,
    bool,
    String,
    String,
    String,
);

const PROJECT_COLUMNS: &str =
    "id, chat_id, name, description, is_live, attributes, created_at, updated_at";

fn project_from_row(row: ProjectRow) -> Project {
    let (id, chat_id, name, description, is_live, attributes, created_at, updated_at) = row;
    Project {
        id,
        chat_id,
        name,
        description,
        is_live,
        attributes: parse_json_object(&attributes),
        created_at,
        updated_at,
    }
}

impl SqliteStore {
    /// All projects of a chat, live first, then by creation.
    pub async fn list_projects(&self, chat_id: &str) -> Result<Vec<Project>, ParleyError> {
        let rows: Vec<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE chat_id = ? \
             ORDER BY is_live DESC, created_at, rowid"
        ))
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("list projects failed: {e}")))?;
        Ok(rows.into_iter().map(project_from_row).collect())
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Option<Project>, ParleyError> {
        let row: Option<ProjectRow> =
            sqlx::query_as(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"))
                .bind(project_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ParleyError::Store(format!("get project failed: {e}")))?;
        Ok(row.map(project_from_row))
    }

    /// Create a live project. Other live projects in the chat are untouched.
    pub async fn create_project(
        &self,
        chat_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, ParleyError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO projects (id, chat_id, name, description) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(chat_id)
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(|e| ParleyError::Store(format!("create project failed: {e}")))?;

        self.get_project(&id)
            .await?
            .ok_or_else(|| ParleyError::Store(format!("project {id} vanished after insert")))
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), ParleyError> {
        sqlx::query(
            "UPDATE projects SET name = COALESCE(?, name), \
             description = COALESCE(?, description), updated_at = datetime('now') \
             WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("update project failed: {e}")))?;
        Ok(())
    }

    pub async fn merge_project_attributes(
        &self,
        project_id: &str,
        attributes: &Value,
        replace: bool,
    ) -> Result<(), ParleyError> {
        let merged = if replace {
            attributes.clone()
        } else {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT attributes FROM projects WHERE id = ?")
                    .bind(project_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| ParleyError::Store(format!("read attributes failed: {e}")))?;
            let Some((raw,)) = row else {
                return Err(ParleyError::Store(format!("project {project_id} not found")));
            };
            let mut current = parse_json_object(&raw);
            merge_json(&mut current, attributes);
            current
        };

        sqlx::query(
            "UPDATE projects SET attributes = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(merged.to_string())
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("write attributes failed: {e}")))?;
        Ok(())
    }

    pub async fn set_project_live(
        &self,
        project_id: &str,
        is_live: bool,
    ) -> Result<(), ParleyError> {
        sqlx::query("UPDATE projects SET is_live = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(is_live)
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ParleyError::Store(format!("set project live failed: {e}")))?;
        Ok(())
    }

    /// Append an entry to the project audit trail.
    pub async fn log_project_event(
        &self,
        project_id: &str,
        event: ProjectEvent,
        detail: Option<&Value>,
    ) -> Result<(), ParleyError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO project_events (id, project_id, event, detail) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(project_id)
            .bind(event.as_str())
            .bind(detail.map(|d| d.to_string()))
            .execute(&self.pool)
            .await
            .map_err(|e| ParleyError::Store(format!("project event insert failed: {e}")))?;

        debug!("project {project_id}: {}", event.as_str());
        Ok(())
    }

    /// Audit trail of one project, oldest first, as `(event, detail)`.
    pub async fn list_project_events(
        &self,
        project_id: &str,
    ) -> Result<Vec<(String, Option<String>)>, ParleyError> {
        sqlx::query_as(
            "SELECT event, detail FROM project_events WHERE project_id = ? \
             ORDER BY created_at, rowid",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("list project events failed: {e}")))
    }
}
