//! Domain records shared between the store, the memory engine, and the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of conversation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Individual,
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Group => "group",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("group") {
            Self::Group
        } else {
            Self::Individual
        }
    }
}

/// Who authored a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s == "agent" {
            Self::Agent
        } else {
            Self::User
        }
    }

    /// Role name expected by chat-completion APIs.
    pub fn api_role(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Normalized phone-like handle (identity key).
    pub handle: String,
    pub display_name: Option<String>,
    pub service: String,
    pub metadata: Value,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    /// External thread id (identity key).
    pub external_id: String,
    pub chat_type: ChatType,
    pub service: String,
    pub metadata: Value,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub content: String,
    pub structured_content: Option<Value>,
    pub message_type: String,
    pub role: MessageRole,
    pub created_at: String,
}

/// A message about to be appended.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: String,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub content: String,
    pub structured_content: Option<Value>,
    pub message_type: String,
    pub role: MessageRole,
    /// Id assigned by the messaging gateway; unique per chat.
    pub external_id: Option<String>,
    /// When the sender sent it, RFC 3339.
    pub sent_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub chat_id: String,
    pub user_id: String,
    pub preferences: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub chat_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_live: bool,
    pub attributes: Value,
    pub created_at: String,
    pub updated_at: String,
}

/// Project lifecycle events recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectEvent {
    Created,
    Updated,
    Completed,
    Referenced,
}

impl ProjectEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Completed => "completed",
            Self::Referenced => "referenced",
        }
    }
}

/// Owner of a memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    User,
    Chat,
}

impl MemoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Chat => "chat",
        }
    }
}

/// One named fact slot with its merge history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryField {
    pub value: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
}

/// How a new value for a memory field combines with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Append to the stored value unless already contained.
    Accumulate,
    /// Overwrite, keeping the prior value as `previous_value`.
    Replace,
}

/// Normalize a phone-like handle so the same person always maps to one key.
///
/// Keeps digits and a leading `+`. Handles with no digits at all (e-mail
/// style) are trimmed and lowercased instead.
pub fn normalize_handle(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return trimmed.to_lowercase();
    }
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
    out
}

/// Recursively merge `patch` into `base`. Objects merge key by key, a `null`
/// in the patch removes the key, anything else overwrites.
pub fn merge_json(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                if value.is_null() {
                    base_map.remove(key);
                } else if let Some(existing) = base_map.get_mut(key) {
                    merge_json(existing, value);
                } else {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        (base, patch) => {
            *base = patch.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_handle_phone_formats() {
        assert_eq!(normalize_handle("+1 (555) 010-0000"), "+15550100000");
        assert_eq!(normalize_handle("555.010.0000"), "5550100000");
        assert_eq!(normalize_handle("  +44 20 7946 0958 "), "+442079460958");
    }

    #[test]
    fn test_normalize_handle_email_style() {
        assert_eq!(normalize_handle(" Ana@Example.COM "), "ana@example.com");
    }

    #[test]
    fn test_merge_json_nested_and_null_removal() {
        let mut base = json!({"onboarding": {"in_progress": true, "step": 1}, "keep": "x"});
        merge_json(
            &mut base,
            &json!({"onboarding": {"step": 2, "in_progress": null}, "group_info": {"a": 1}}),
        );
        assert_eq!(
            base,
            json!({"onboarding": {"step": 2}, "keep": "x", "group_info": {"a": 1}})
        );
    }

    #[test]
    fn test_merge_json_non_object_base_is_replaced() {
        let mut base = Value::Null;
        merge_json(&mut base, &json!({"a": 1}));
        assert_eq!(base, json!({"a": 1}));
    }

    #[test]
    fn test_chat_type_parse_and_roles() {
        assert_eq!(ChatType::parse("GROUP"), ChatType::Group);
        assert_eq!(ChatType::parse("anything"), ChatType::Individual);
        assert_eq!(MessageRole::parse("agent").api_role(), "assistant");
        assert_eq!(MessageRole::parse("user").as_str(), "user");
    }
}
