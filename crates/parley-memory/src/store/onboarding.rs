//! Typed access to onboarding records embedded in user and chat metadata.

use super::{MetadataTable, SqliteStore};
use parley_core::{
    error::ParleyError,
    model::MemoryScope,
    onboarding::{OnboardingState, GROUP_INFO_KEY, ONBOARDING_KEY},
};
use serde_json::Value;
use tracing::warn;

fn table_for(scope: MemoryScope) -> MetadataTable {
    match scope {
        MemoryScope::User => MetadataTable::Users,
        MemoryScope::Chat => MetadataTable::Chats,
    }
}

impl SqliteStore {
    /// Load `metadata.onboarding`. A record that is not an object reads as absent.
    pub async fn load_onboarding(
        &self,
        scope: MemoryScope,
        owner_id: &str,
    ) -> Result<Option<OnboardingState>, ParleyError> {
        let metadata = self.read_metadata(table_for(scope), owner_id).await?;
        let Some(raw) = metadata.get(ONBOARDING_KEY) else {
            return Ok(None);
        };
        if !raw.is_object() {
            warn!("onboarding record for {owner_id} is not an object, ignoring");
            return Ok(None);
        }
        match serde_json::from_value::<OnboardingState>(raw.clone()) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!("onboarding record for {owner_id} unreadable: {e}");
                Ok(None)
            }
        }
    }

    /// Replace `metadata.onboarding` wholesale so a restarted dialog leaves no
    /// stale answers behind.
    pub async fn save_onboarding(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        state: &OnboardingState,
    ) -> Result<(), ParleyError> {
        let table = table_for(scope);
        let mut metadata = self.read_metadata(table, owner_id).await?;
        let value = serde_json::to_value(state)?;
        if let Value::Object(map) = &mut metadata {
            map.insert(ONBOARDING_KEY.to_string(), value);
        }
        self.write_metadata(table, owner_id, &metadata).await
    }

    /// Merge collected group details into `metadata.group_info`.
    pub async fn save_group_info(&self, chat_id: &str, info: &Value) -> Result<(), ParleyError> {
        let mut patch = serde_json::Map::new();
        patch.insert(GROUP_INFO_KEY.to_string(), info.clone());
        self.merge_metadata(MetadataTable::Chats, chat_id, &Value::Object(patch))
            .await
            .map(|_| ())
    }
}
