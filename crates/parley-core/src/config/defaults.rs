//! `#[serde(default = "...")]` helpers for the config structs.

use crate::onboarding::FieldDefinition;

pub(super) fn default_true() -> bool {
    true
}

// --- [parley] ---

pub(super) fn default_name() -> String {
    "Parley".to_string()
}
pub(super) fn default_data_dir() -> String {
    "~/.parley".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}

// --- [provider] ---

pub(super) fn default_provider() -> String {
    "openai".to_string()
}
pub(super) fn default_provider_timeout() -> u64 {
    60
}
pub(super) fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
pub(super) fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
pub(super) fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
pub(super) fn default_anthropic_max_tokens() -> u32 {
    1024
}

// --- [memory] ---

pub(super) fn default_db_path() -> String {
    "~/.parley/data/parley.db".to_string()
}
pub(super) fn default_max_context() -> usize {
    20
}
pub(super) fn default_cache_capacity() -> usize {
    20
}
pub(super) fn default_cache_max_threads() -> usize {
    1000
}

// --- [delivery] ---

pub(super) fn default_delivery_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
pub(super) fn default_chunk_delay_ms() -> u64 {
    1500
}
pub(super) fn default_skip_services() -> Vec<String> {
    vec!["test".to_string(), "internal".to_string()]
}

// --- [api] ---

pub(super) fn default_api_host() -> String {
    "127.0.0.1".to_string()
}
pub(super) fn default_api_port() -> u16 {
    3000
}

// --- [onboarding] ---

pub(super) fn default_trigger_phrase() -> String {
    "start onboarding".to_string()
}
pub(super) fn default_individual_final_message() -> String {
    "Thanks, that's everything I need. Welcome aboard!".to_string()
}
pub(super) fn default_group_final_message() -> String {
    "Thanks everyone, this group is all set up.".to_string()
}

pub(super) fn default_individual_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition {
            id: "name".to_string(),
            description: "full name".to_string(),
            required: true,
            question: None,
        },
        FieldDefinition {
            id: "email".to_string(),
            description: "email address".to_string(),
            required: true,
            question: None,
        },
    ]
}

pub(super) fn default_group_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition {
            id: "group_purpose".to_string(),
            description: "purpose of this group".to_string(),
            required: true,
            question: Some("Hi all! What is this group for?".to_string()),
        },
        FieldDefinition {
            id: "group_goals".to_string(),
            description: "goals for this group".to_string(),
            required: true,
            question: Some("What would you like to achieve together?".to_string()),
        },
    ]
}
