use std::collections::BTreeMap;

use super::SqliteStore;
use async_trait::async_trait;
use parley_core::{
    error::ParleyError,
    model::{
        Chat, ChatType, MemoryField, MemoryScope, Message, NewMessage, Project, ProjectEvent, User,
    },
    onboarding::OnboardingState,
    traits::ChatStore,
};
use serde_json::Value;

#[async_trait]
impl ChatStore for SqliteStore {
    async fn ping(&self) -> Result<(), ParleyError> {
        SqliteStore::ping(self).await
    }

    async fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>, ParleyError> {
        SqliteStore::get_user_by_handle(self, handle).await
    }

    async fn create_user(
        &self,
        handle: &str,
        display_name: Option<&str>,
        service: &str,
    ) -> Result<User, ParleyError> {
        SqliteStore::create_user(self, handle, display_name, service).await
    }

    async fn merge_user_metadata(
        &self,
        user_id: &str,
        patch: &Value,
    ) -> Result<Value, ParleyError> {
        SqliteStore::merge_user_metadata(self, user_id, patch).await
    }

    async fn get_chat_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Chat>, ParleyError> {
        SqliteStore::get_chat_by_external_id(self, external_id).await
    }

    async fn create_chat(
        &self,
        external_id: &str,
        chat_type: ChatType,
        service: &str,
    ) -> Result<Chat, ParleyError> {
        SqliteStore::create_chat(self, external_id, chat_type, service).await
    }

    async fn merge_chat_metadata(
        &self,
        chat_id: &str,
        patch: &Value,
    ) -> Result<Value, ParleyError> {
        SqliteStore::merge_chat_metadata(self, chat_id, patch).await
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message, ParleyError> {
        SqliteStore::append_message(self, message).await
    }

    async fn has_external_message(
        &self,
        chat_id: &str,
        external_id: &str,
    ) -> Result<bool, ParleyError> {
        SqliteStore::has_external_message(self, chat_id, external_id).await
    }

    async fn list_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, ParleyError> {
        SqliteStore::list_recent_messages(self, chat_id, limit).await
    }

    async fn upsert_participant(&self, chat_id: &str, user_id: &str) -> Result<(), ParleyError> {
        SqliteStore::upsert_participant(self, chat_id, user_id).await
    }

    async fn list_projects(&self, chat_id: &str) -> Result<Vec<Project>, ParleyError> {
        SqliteStore::list_projects(self, chat_id).await
    }

    async fn create_project(
        &self,
        chat_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, ParleyError> {
        SqliteStore::create_project(self, chat_id, name, description).await
    }

    async fn update_project(
        &self,
        project_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), ParleyError> {
        SqliteStore::update_project(self, project_id, name, description).await
    }

    async fn merge_project_attributes(
        &self,
        project_id: &str,
        attributes: &Value,
        replace: bool,
    ) -> Result<(), ParleyError> {
        SqliteStore::merge_project_attributes(self, project_id, attributes, replace).await
    }

    async fn set_project_live(&self, project_id: &str, is_live: bool) -> Result<(), ParleyError> {
        SqliteStore::set_project_live(self, project_id, is_live).await
    }

    async fn log_project_event(
        &self,
        project_id: &str,
        event: ProjectEvent,
        detail: Option<&Value>,
    ) -> Result<(), ParleyError> {
        SqliteStore::log_project_event(self, project_id, event, detail).await
    }

    async fn get_memory_field(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        field_id: &str,
    ) -> Result<Option<MemoryField>, ParleyError> {
        SqliteStore::get_memory_field(self, scope, owner_id, field_id).await
    }

    async fn set_memory_field(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        field_id: &str,
        field: &MemoryField,
    ) -> Result<(), ParleyError> {
        SqliteStore::set_memory_field(self, scope, owner_id, field_id, field).await
    }

    async fn delete_memory_field(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        field_id: &str,
    ) -> Result<(), ParleyError> {
        SqliteStore::delete_memory_field(self, scope, owner_id, field_id).await
    }

    async fn get_all_memory(
        &self,
        scope: MemoryScope,
        owner_id: &str,
    ) -> Result<BTreeMap<String, MemoryField>, ParleyError> {
        SqliteStore::get_all_memory(self, scope, owner_id).await
    }

    async fn load_onboarding(
        &self,
        scope: MemoryScope,
        owner_id: &str,
    ) -> Result<Option<OnboardingState>, ParleyError> {
        SqliteStore::load_onboarding(self, scope, owner_id).await
    }

    async fn save_onboarding(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        state: &OnboardingState,
    ) -> Result<(), ParleyError> {
        SqliteStore::save_onboarding(self, scope, owner_id, state).await
    }

    async fn save_group_info(&self, chat_id: &str, info: &Value) -> Result<(), ParleyError> {
        SqliteStore::save_group_info(self, chat_id, info).await
    }
}
