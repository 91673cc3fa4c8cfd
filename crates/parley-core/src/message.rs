use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ChatType;

/// An inbound message as delivered by the messaging gateway webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// External thread id (one chat per thread).
    pub thread_id: String,
    /// Platform message id.
    pub message_id: String,
    pub message_content: MessageContent,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    /// Phone-like handle of the sender.
    pub sender_number: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub thread_type: ChatType,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Service the message arrived through (e.g. "imessage", "sms", "test").
    pub service: String,
    /// The agent's own account on that service.
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Message body. `text` is always present (possibly empty); typed extras such
/// as attachments or reactions are kept verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_message_type() -> String {
    "text".to_string()
}

impl InboundMessage {
    /// Raw text of the message.
    pub fn text(&self) -> &str {
        &self.message_content.text
    }

    pub fn is_group(&self) -> bool {
        self.thread_type == ChatType::Group
    }

    /// Structured content worth persisting next to the raw text, if any.
    pub fn structured_content(&self) -> Option<serde_json::Value> {
        if self.message_content.extra.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(
                self.message_content.extra.clone(),
            ))
        }
    }

    /// First 60 characters of the text, for log lines.
    pub fn preview(&self) -> String {
        let text = self.text();
        if text.chars().count() > 60 {
            let truncated: String = text.chars().take(60).collect();
            format!("{truncated}...")
        } else {
            text.to_string()
        }
    }
}

/// An outgoing message: either a provider completion or a unit handed to the
/// delivery gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub metadata: MessageMetadata,
    /// Recipient handle (individual) or thread id (group).
    #[serde(default)]
    pub reply_target: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    /// Messaging service the unit is routed through (e.g. "imessage").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Sending account on the delivery side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

/// Metadata about how a message was generated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageMetadata {
    /// Which provider produced this response.
    pub provider_used: String,
    /// Token count (if available from the provider).
    pub tokens_used: Option<u64>,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
    /// Model identifier (if applicable).
    pub model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_deserialize_full_payload() {
        let json = r#"{
            "thread_id": "t-1",
            "message_id": "m-1",
            "message_content": {"text": "hello", "attachments": []},
            "message_type": "text",
            "sender_number": "+1 (555) 010-0000",
            "sender_name": "Ana",
            "thread_type": "group",
            "timestamp": "2026-01-02T03:04:05Z",
            "service": "imessage",
            "account_id": "+15550109999"
        }"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.text(), "hello");
        assert!(msg.is_group());
        assert!(msg.structured_content().is_some());
        assert_eq!(msg.account_id.as_deref(), Some("+15550109999"));
    }

    #[test]
    fn test_inbound_defaults_for_optional_fields() {
        let json = r#"{
            "thread_id": "t-1",
            "message_id": "m-1",
            "message_content": {"text": "hi"},
            "sender_number": "+15550100000",
            "thread_type": "individual",
            "service": "sms"
        }"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_type, "text");
        assert!(msg.sender_name.is_none());
        assert!(msg.structured_content().is_none());
        assert!(!msg.is_group());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let mut msg: InboundMessage = serde_json::from_str(
            r#"{"thread_id":"t","message_id":"m","message_content":{"text":""},
                "sender_number":"1","thread_type":"individual","service":"sms"}"#,
        )
        .unwrap();
        msg.message_content.text = "é".repeat(80);
        let preview = msg.preview();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 63);
    }
}
