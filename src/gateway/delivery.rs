//! Reply delivery: split, persist, send.

use std::time::Duration;

use parley_channels::split::split_paragraphs;
use parley_core::{
    message::InboundMessage,
    model::{MessageRole, NewMessage},
};
use tracing::{debug, warn};

use super::Gateway;

/// Where a reply goes.
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    pub thread_id: String,
    /// Raw sender handle, used as the recipient of individual replies.
    pub recipient: String,
    pub is_group: bool,
    pub service: String,
    pub account_id: Option<String>,
    /// Durable chat id; agent messages are only persisted when present.
    pub chat_id: Option<String>,
}

impl DeliveryTarget {
    pub fn reply_to(msg: &InboundMessage, chat_id: Option<String>) -> Self {
        Self {
            thread_id: msg.thread_id.clone(),
            recipient: msg.sender_number.clone(),
            is_group: msg.is_group(),
            service: msg.service.clone(),
            account_id: msg.account_id.clone(),
            chat_id,
        }
    }
}

impl Gateway {
    /// Units a reply is delivered in.
    pub(super) fn delivery_units<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if self.config.delivery.chunk_messages {
            split_paragraphs(text)
        } else {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed]
            }
        }
    }

    /// Persist and send `text`. Send failures are logged per unit and never
    /// stop the remaining units.
    pub(super) async fn deliver(&self, text: &str, target: &DeliveryTarget) {
        let units = self.delivery_units(text);
        let skip = self.config.delivery.skips(&target.service);
        let delay = Duration::from_millis(self.config.delivery.chunk_delay_ms);

        for (i, unit) in units.iter().enumerate() {
            if i > 0 && !skip && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if let (Some(store), Some(chat_id)) = (&self.store, target.chat_id.as_deref()) {
                let record = NewMessage {
                    chat_id: chat_id.to_string(),
                    sender_id: None,
                    sender_name: Some(self.config.parley.name.clone()),
                    content: unit.to_string(),
                    structured_content: None,
                    message_type: "text".to_string(),
                    role: MessageRole::Agent,
                    external_id: None,
                    sent_at: None,
                };
                if let Err(e) = store.append_message(record).await {
                    warn!("[{}] failed to persist reply: {e}", target.thread_id);
                }
            }

            if skip {
                debug!(
                    "[{}] service {} skipped, not sending unit {}",
                    target.thread_id,
                    target.service,
                    i + 1
                );
                continue;
            }

            let account = target.account_id.as_deref();
            let sent = if target.is_group {
                self.channel
                    .send_to_group(unit, &target.thread_id, &target.service, account)
                    .await
            } else {
                self.channel
                    .send_to_individual(unit, &target.recipient, &target.service, account)
                    .await
            };
            if let Err(e) = sent {
                warn!(
                    "[{}] delivery of unit {}/{} failed: {e}",
                    target.thread_id,
                    i + 1,
                    units.len()
                );
            }
        }
    }
}
