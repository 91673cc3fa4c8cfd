//! Append-only transcript and participant links.

use super::SqliteStore;
use parley_core::{
    error::ParleyError,
    model::{Message, MessageRole, NewMessage},
};
use uuid::Uuid;

type MessageRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
    String,
);

const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, sender_name, content, \
     structured_content, message_type, role, created_at";

fn message_from_row(row: MessageRow) -> Message {
    let (
        id,
        chat_id,
        sender_id,
        sender_name,
        content,
        structured_content,
        message_type,
        role,
        created_at,
    ) = row;
    Message {
        id,
        chat_id,
        sender_id,
        sender_name,
        content,
        structured_content: structured_content.and_then(|s| serde_json::from_str(&s).ok()),
        message_type,
        role: MessageRole::parse(&role),
        created_at,
    }
}

impl SqliteStore {
    pub async fn append_message(&self, message: NewMessage) -> Result<Message, ParleyError> {
        let id = Uuid::new_v4().to_string();
        let structured = message.structured_content.as_ref().map(|v| v.to_string());

        sqlx::query(
            "INSERT INTO messages \
             (id, chat_id, sender_id, sender_name, content, structured_content, message_type, role, \
              external_id, sent_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&message.chat_id)
        .bind(&message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.content)
        .bind(&structured)
        .bind(&message.message_type)
        .bind(message.role.as_str())
        .bind(&message.external_id)
        .bind(&message.sent_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("append message failed: {e}")))?;

        let row: MessageRow =
            sqlx::query_as(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"))
                .bind(&id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| ParleyError::Store(format!("read back message failed: {e}")))?;
        Ok(message_from_row(row))
    }

    /// Whether a message with this gateway id is already stored for the chat.
    pub async fn has_external_message(
        &self,
        chat_id: &str,
        external_id: &str,
    ) -> Result<bool, ParleyError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM messages WHERE chat_id = ? AND external_id = ?")
                .bind(chat_id)
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ParleyError::Store(format!("message lookup failed: {e}")))?;
        Ok(row.is_some())
    }

    /// The most recent `limit` messages of a chat, oldest first.
    pub async fn list_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, ParleyError> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(chat_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("list messages failed: {e}")))?;

        Ok(rows.into_iter().rev().map(message_from_row).collect())
    }

    /// Link a user to a chat. Existing links keep their preferences.
    pub async fn upsert_participant(&self, chat_id: &str, user_id: &str) -> Result<(), ParleyError> {
        sqlx::query(
            "INSERT INTO participants (chat_id, user_id) VALUES (?, ?) \
             ON CONFLICT(chat_id, user_id) DO NOTHING",
        )
        .bind(chat_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("upsert participant failed: {e}")))?;
        Ok(())
    }

    /// All participant links of a chat.
    pub async fn list_participants(
        &self,
        chat_id: &str,
    ) -> Result<Vec<parley_core::model::Participant>, ParleyError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT chat_id, user_id, preferences FROM participants WHERE chat_id = ? \
             ORDER BY created_at, rowid",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("list participants failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(chat_id, user_id, preferences)| parley_core::model::Participant {
                chat_id,
                user_id,
                preferences: super::parse_json_object(&preferences),
            })
            .collect())
    }
}
