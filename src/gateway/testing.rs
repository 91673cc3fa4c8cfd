//! Test doubles shared by the gateway and API test suites.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parley_core::{
    error::ParleyError,
    model::{Chat, ChatType, MemoryField, MemoryScope, Message, NewMessage, Project, ProjectEvent, User},
    onboarding::OnboardingState,
    traits::ChatStore,
};
use serde_json::Value;

/// A store that is never reachable.
pub(crate) struct FailingStore;

fn down<T>() -> Result<T, ParleyError> {
    Err(ParleyError::Store("connection refused".into()))
}

#[async_trait]
impl ChatStore for FailingStore {
    async fn ping(&self) -> Result<(), ParleyError> {
        down()
    }
    async fn get_user_by_handle(&self, _: &str) -> Result<Option<User>, ParleyError> {
        down()
    }
    async fn create_user(&self, _: &str, _: Option<&str>, _: &str) -> Result<User, ParleyError> {
        down()
    }
    async fn merge_user_metadata(&self, _: &str, _: &Value) -> Result<Value, ParleyError> {
        down()
    }
    async fn get_chat_by_external_id(&self, _: &str) -> Result<Option<Chat>, ParleyError> {
        down()
    }
    async fn create_chat(&self, _: &str, _: ChatType, _: &str) -> Result<Chat, ParleyError> {
        down()
    }
    async fn merge_chat_metadata(&self, _: &str, _: &Value) -> Result<Value, ParleyError> {
        down()
    }
    async fn append_message(&self, _: NewMessage) -> Result<Message, ParleyError> {
        down()
    }
    async fn has_external_message(&self, _: &str, _: &str) -> Result<bool, ParleyError> {
        down()
    }
    async fn list_recent_messages(&self, _: &str, _: usize) -> Result<Vec<Message>, ParleyError> {
        down()
    }
    async fn upsert_participant(&self, _: &str, _: &str) -> Result<(), ParleyError> {
        down()
    }
    async fn list_projects(&self, _: &str) -> Result<Vec<Project>, ParleyError> {
        down()
    }
    async fn create_project(
        &self,
        _: &str,
        _: &str,
        _: Option<&str>,
    ) -> Result<Project, ParleyError> {
        down()
    }
    async fn update_project(
        &self,
        _: &str,
        _: Option<&str>,
        _: Option<&str>,
    ) -> Result<(), ParleyError> {
        down()
    }
    async fn merge_project_attributes(&self, _: &str, _: &Value, _: bool) -> Result<(), ParleyError> {
        down()
    }
    async fn set_project_live(&self, _: &str, _: bool) -> Result<(), ParleyError> {
        down()
    }
    async fn log_project_event(
        &self,
        _: &str,
        _: ProjectEvent,
        _: Option<&Value>,
    ) -> Result<(), ParleyError> {
        down()
    }
    async fn get_memory_field(
        &self,
        _: MemoryScope,
        _: &str,
        _: &str,
    ) -> Result<Option<MemoryField>, ParleyError> {
        down()
    }
    async fn set_memory_field(
        &self,
        _: MemoryScope,
        _: &str,
        _: &str,
        _: &MemoryField,
    ) -> Result<(), ParleyError> {
        down()
    }
    async fn delete_memory_field(&self, _: MemoryScope, _: &str, _: &str) -> Result<(), ParleyError> {
        down()
    }
    async fn get_all_memory(
        &self,
        _: MemoryScope,
        _: &str,
    ) -> Result<BTreeMap<String, MemoryField>, ParleyError> {
        down()
    }
    async fn load_onboarding(
        &self,
        _: MemoryScope,
        _: &str,
    ) -> Result<Option<OnboardingState>, ParleyError> {
        down()
    }
    async fn save_onboarding(
        &self,
        _: MemoryScope,
        _: &str,
        _: &OnboardingState,
    ) -> Result<(), ParleyError> {
        down()
    }
    async fn save_group_info(&self, _: &str, _: &Value) -> Result<(), ParleyError> {
        down()
    }
}
