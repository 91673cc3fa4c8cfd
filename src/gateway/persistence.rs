//! Inbound persistence: durable store first, ephemeral cache always.
//! Redelivered gateway message ids are recognized and dropped.

use std::sync::Arc;

use parley_core::{
    error::ParleyError,
    message::InboundMessage,
    model::{normalize_handle, Message, MessageRole, NewMessage},
    traits::ChatStore,
};
use tracing::warn;

use super::Gateway;

/// What persistence learned about the inbound message.
#[derive(Debug, Clone, Default)]
pub(super) struct PersistOutcome {
    /// Durable chat id; `None` when the store was unavailable.
    pub chat_id: Option<String>,
    pub is_new_chat: bool,
    /// Durable user id of the sender; `None` for the agent or without a store.
    pub sender_user_id: Option<String>,
    /// The gateway delivered this message id before (a webhook retry).
    pub duplicate: bool,
}

struct Durable {
    chat_id: String,
    is_new_chat: bool,
    sender_user_id: Option<String>,
    duplicate: bool,
}

impl Gateway {
    /// Whether the inbound message was sent by the agent itself.
    pub(super) fn is_self_authored(&self, msg: &InboundMessage) -> bool {
        let sender = normalize_handle(&msg.sender_number);
        if let Some(account) = msg.account_id.as_deref() {
            let account = normalize_handle(account);
            if !account.is_empty() && account == sender {
                return true;
            }
        }
        self.config.parley.is_agent_handle(&msg.sender_number)
    }

    pub(super) async fn persist(&self, msg: &InboundMessage) -> PersistOutcome {
        let self_authored = self.is_self_authored(msg);
        let role = if self_authored {
            MessageRole::Agent
        } else {
            MessageRole::User
        };

        let cached = Message {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: msg.thread_id.clone(),
            sender_id: None,
            sender_name: msg.sender_name.clone(),
            content: msg.text().to_string(),
            structured_content: msg.structured_content(),
            message_type: msg.message_type.clone(),
            role,
            created_at: msg.timestamp.to_rfc3339(),
        };

        let Some(store) = &self.store else {
            return PersistOutcome {
                is_new_chat: self.cache.record(&msg.thread_id, cached).await,
                ..Default::default()
            };
        };

        match persist_durable(store, msg, role, self_authored).await {
            Ok(durable) if durable.duplicate => PersistOutcome {
                chat_id: Some(durable.chat_id),
                duplicate: true,
                ..Default::default()
            },
            Ok(durable) => {
                self.cache.record(&msg.thread_id, cached).await;
                PersistOutcome {
                    chat_id: Some(durable.chat_id),
                    is_new_chat: durable.is_new_chat,
                    sender_user_id: durable.sender_user_id,
                    duplicate: false,
                }
            }
            Err(e) => {
                warn!(
                    "[{}] store unavailable, using cache only: {e}",
                    msg.thread_id
                );
                PersistOutcome {
                    is_new_chat: self.cache.record(&msg.thread_id, cached).await,
                    ..Default::default()
                }
            }
        }
    }

    /// Recent messages for `thread_id`, oldest first. The durable window wins
    /// when it is reachable and non-empty.
    pub(super) async fn recent_context(
        &self,
        thread_id: &str,
        chat_id: Option<&str>,
    ) -> Vec<Message> {
        let limit = self.config.memory.max_context_messages;
        if let (Some(store), Some(chat_id)) = (&self.store, chat_id) {
            match store.list_recent_messages(chat_id, limit).await {
                Ok(messages) if !messages.is_empty() => return messages,
                Ok(_) => {}
                Err(e) => warn!("[{thread_id}] recent messages unavailable: {e}"),
            }
        }
        self.cache.recent(thread_id, limit).await
    }
}

async fn persist_durable(
    store: &Arc<dyn ChatStore>,
    msg: &InboundMessage,
    role: MessageRole,
    self_authored: bool,
) -> Result<Durable, ParleyError> {
    let (chat, is_new_chat) = match store.get_chat_by_external_id(&msg.thread_id).await? {
        Some(chat) => (chat, false),
        None => (
            store
                .create_chat(&msg.thread_id, msg.thread_type, &msg.service)
                .await?,
            true,
        ),
    };

    let external_id = Some(msg.message_id.trim()).filter(|id| !id.is_empty());
    if let Some(id) = external_id {
        if !is_new_chat && store.has_external_message(&chat.id, id).await? {
            return Ok(Durable {
                chat_id: chat.id,
                is_new_chat,
                sender_user_id: None,
                duplicate: true,
            });
        }
    }

    let sender_user_id = if self_authored {
        None
    } else {
        let handle = normalize_handle(&msg.sender_number);
        let user = match store.get_user_by_handle(&handle).await? {
            Some(user) => user,
            None => {
                store
                    .create_user(&handle, msg.sender_name.as_deref(), &msg.service)
                    .await?
            }
        };
        store.upsert_participant(&chat.id, &user.id).await?;
        Some(user.id)
    };

    store
        .append_message(NewMessage {
            chat_id: chat.id.clone(),
            sender_id: sender_user_id.clone(),
            sender_name: msg.sender_name.clone(),
            content: msg.text().to_string(),
            structured_content: msg.structured_content(),
            message_type: msg.message_type.clone(),
            role,
            external_id: external_id.map(str::to_string),
            sent_at: Some(msg.timestamp.to_rfc3339()),
        })
        .await?;

    Ok(Durable {
        chat_id: chat.id,
        is_new_chat,
        sender_user_id,
        duplicate: false,
    })
}
