//! Users, keyed by normalized handle.

use super::{parse_json_object, MetadataTable, SqliteStore};
use parley_core::{
    error::ParleyError,
    model::{normalize_handle, User},
};
use serde_json::Value;
use uuid::Uuid;

type UserRow = (String, String, Option<String>, String, String, String, String);

const USER_COLUMNS: &str =
    "id, handle, display_name, service, metadata, created_at, updated_at";

fn user_from_row(row: UserRow) -> User {
    let (id, handle, display_name, service, metadata, created_at, updated_at) = row;
    User {
        id,
        handle,
        display_name,
        service,
        metadata: parse_json_object(&metadata),
        created_at,
        updated_at,
    }
}

impl SqliteStore {
    /// Look up a user by handle (normalized before lookup).
    pub async fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>, ParleyError> {
        let handle = normalize_handle(handle);
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE handle = ?"))
                .bind(&handle)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ParleyError::Store(format!("get user failed: {e}")))?;
        Ok(row.map(user_from_row))
    }

    /// Create a user. If the handle already exists the existing row is returned.
    pub async fn create_user(
        &self,
        handle: &str,
        display_name: Option<&str>,
        service: &str,
    ) -> Result<User, ParleyError> {
        let normalized = normalize_handle(handle);
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, handle, display_name, service) VALUES (?, ?, ?, ?) \
             ON CONFLICT(handle) DO NOTHING",
        )
        .bind(&id)
        .bind(&normalized)
        .bind(display_name)
        .bind(service)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("create user failed: {e}")))?;

        self.get_user_by_handle(&normalized)
            .await?
            .ok_or_else(|| ParleyError::Store(format!("user {normalized} vanished after insert")))
    }

    pub async fn merge_user_metadata(
        &self,
        user_id: &str,
        patch: &Value,
    ) -> Result<Value, ParleyError> {
        self.merge_metadata(MetadataTable::Users, user_id, patch)
            .await
    }
}
