use std::collections::BTreeMap;

use crate::{
    context::Context,
    error::ParleyError,
    message::OutgoingMessage,
    model::{
        Chat, ChatType, MemoryField, MemoryScope, Message, NewMessage, Project, ProjectEvent, User,
    },
    onboarding::OnboardingState,
};
use async_trait::async_trait;
use serde_json::Value;

/// Reasoning service.
///
/// Every backend (OpenAI-compatible endpoints, Anthropic) implements this
/// trait so the gateway can swap them without touching the pipeline.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider requires an API key to function.
    fn requires_api_key(&self) -> bool;

    /// Send a conversation context to the provider and get a response.
    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, ParleyError>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool;
}

/// Outbound delivery gateway.
///
/// Fire-and-forget: implementations hand the message to the transport and
/// return without waiting for a delivery receipt.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Hand a message to the transport.
    async fn send(&self, message: OutgoingMessage) -> Result<(), ParleyError>;

    /// Send text to a single recipient.
    async fn send_to_individual(
        &self,
        text: &str,
        recipient: &str,
        service: &str,
        account_id: Option<&str>,
    ) -> Result<(), ParleyError> {
        self.send(OutgoingMessage {
            text: text.to_string(),
            reply_target: Some(recipient.to_string()),
            is_group: false,
            service: Some(service.to_string()),
            account_id: account_id.map(str::to_string),
            ..Default::default()
        })
        .await
    }

    /// Send text to a group thread.
    async fn send_to_group(
        &self,
        text: &str,
        thread_id: &str,
        service: &str,
        account_id: Option<&str>,
    ) -> Result<(), ParleyError> {
        self.send(OutgoingMessage {
            text: text.to_string(),
            reply_target: Some(thread_id.to_string()),
            is_group: true,
            service: Some(service.to_string()),
            account_id: account_id.map(str::to_string),
            ..Default::default()
        })
        .await
    }
}

/// Durable storage for users, chats, messages, projects and memory.
///
/// Every method may fail; callers treat failure as "store unavailable" and
/// degrade rather than abort. `Ok(None)` from a lookup means the record does
/// not exist yet.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Cheap reachability probe.
    async fn ping(&self) -> Result<(), ParleyError>;

    // --- users ---

    async fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>, ParleyError>;

    async fn create_user(
        &self,
        handle: &str,
        display_name: Option<&str>,
        service: &str,
    ) -> Result<User, ParleyError>;

    /// Read-merge-write of the user's metadata JSON. Returns the merged value.
    async fn merge_user_metadata(&self, user_id: &str, patch: &Value)
        -> Result<Value, ParleyError>;

    // --- chats ---

    async fn get_chat_by_external_id(&self, external_id: &str)
        -> Result<Option<Chat>, ParleyError>;

    async fn create_chat(
        &self,
        external_id: &str,
        chat_type: ChatType,
        service: &str,
    ) -> Result<Chat, ParleyError>;

    /// Read-merge-write of the chat's metadata JSON. Returns the merged value.
    async fn merge_chat_metadata(&self, chat_id: &str, patch: &Value)
        -> Result<Value, ParleyError>;

    // --- messages ---

    async fn append_message(&self, message: NewMessage) -> Result<Message, ParleyError>;

    /// Whether a message with this gateway id is already stored for the chat.
    async fn has_external_message(&self, chat_id: &str, external_id: &str)
        -> Result<bool, ParleyError>;

    /// The most recent `limit` messages of a chat, oldest first.
    async fn list_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, ParleyError>;

    /// Link a user to a chat. No-op when the link already exists.
    async fn upsert_participant(&self, chat_id: &str, user_id: &str) -> Result<(), ParleyError>;

    // --- projects ---

    async fn list_projects(&self, chat_id: &str) -> Result<Vec<Project>, ParleyError>;

    async fn create_project(
        &self,
        chat_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, ParleyError>;

    /// Overwrite the name and/or description.
    async fn update_project(
        &self,
        project_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), ParleyError>;

    /// Merge `attributes` into the project's attribute map, or replace it
    /// wholesale when `replace` is set.
    async fn merge_project_attributes(
        &self,
        project_id: &str,
        attributes: &Value,
        replace: bool,
    ) -> Result<(), ParleyError>;

    async fn set_project_live(&self, project_id: &str, is_live: bool) -> Result<(), ParleyError>;

    /// Append to the project audit trail.
    async fn log_project_event(
        &self,
        project_id: &str,
        event: ProjectEvent,
        detail: Option<&Value>,
    ) -> Result<(), ParleyError>;

    // --- memory ---

    async fn get_memory_field(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        field_id: &str,
    ) -> Result<Option<MemoryField>, ParleyError>;

    async fn set_memory_field(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        field_id: &str,
        field: &MemoryField,
    ) -> Result<(), ParleyError>;

    async fn delete_memory_field(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        field_id: &str,
    ) -> Result<(), ParleyError>;

    async fn get_all_memory(
        &self,
        scope: MemoryScope,
        owner_id: &str,
    ) -> Result<BTreeMap<String, MemoryField>, ParleyError>;

    // --- onboarding ---

    /// Onboarding record stored under the owner's `metadata.onboarding`.
    /// `MemoryScope::User` addresses a user, `MemoryScope::Chat` a chat.
    async fn load_onboarding(
        &self,
        scope: MemoryScope,
        owner_id: &str,
    ) -> Result<Option<OnboardingState>, ParleyError>;

    async fn save_onboarding(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        state: &OnboardingState,
    ) -> Result<(), ParleyError>;

    /// Merge collected group details into the chat's `metadata.group_info`.
    async fn save_group_info(&self, chat_id: &str, info: &Value) -> Result<(), ParleyError>;
}
