//! Chats, keyed by the transport's thread id.

use super::{parse_json_object, MetadataTable, SqliteStore};
use parley_core::{
    error::ParleyError,
    model::{Chat, ChatType},
};
use serde_json::Value;
use uuid::Uuid;

type ChatRow = (String, String, String, String, String, String, String);

fn chat_from_row(row: ChatRow) -> Chat {
    let (id, external_id, chat_type, service, metadata, created_at, updated_at) = row;
    Chat {
        id,
        external_id,
        chat_type: ChatType::parse(&chat_type),
        service,
        metadata: parse_json_object(&metadata),
        created_at,
        updated_at,
    }
}

impl SqliteStore {
    pub async fn get_chat_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Chat>, ParleyError> {
        let row: Option<ChatRow> = sqlx::query_as(
            "SELECT id, external_id, chat_type, service, metadata, created_at, updated_at \
             FROM chats WHERE external_id = ?",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("get chat failed: {e}")))?;
        Ok(row.map(chat_from_row))
    }

    /// Create a chat. If the thread already exists the existing row is returned.
    pub async fn create_chat(
        &self,
        external_id: &str,
        chat_type: ChatType,
        service: &str,
    ) -> Result<Chat, ParleyError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO chats (id, external_id, chat_type, service) VALUES (?, ?, ?, ?) \
             ON CONFLICT(external_id) DO NOTHING",
        )
        .bind(&id)
        .bind(external_id)
        .bind(chat_type.as_str())
        .bind(service)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("create chat failed: {e}")))?;

        self.get_chat_by_external_id(external_id)
            .await?
            .ok_or_else(|| ParleyError::Store(format!("chat {external_id} vanished after insert")))
    }

    pub async fn merge_chat_metadata(
        &self,
        chat_id: &str,
        patch: &Value,
    ) -> Result<Value, ParleyError> {
        self.merge_metadata(MetadataTable::Chats, chat_id, patch)
            .await
    }
}
