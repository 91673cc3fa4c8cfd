//! Group onboarding: one question at a time, the next message is the answer.

use chrono::Utc;
use parley_core::{
    error::ParleyError,
    model::MemoryScope,
    onboarding::OnboardingState,
};
use serde_json::{Map, Value};
use tracing::info;

use super::Gateway;

impl Gateway {
    /// Start the group dialog and return the first question.
    pub(super) async fn start_group_onboarding(
        &self,
        chat_id: &str,
    ) -> Result<Option<String>, ParleyError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let state = OnboardingState::start(&self.config.onboarding.group.fields, Utc::now());
        store
            .save_onboarding(MemoryScope::Chat, chat_id, &state)
            .await?;
        info!("[{chat_id}] group onboarding started");
        Ok(state.head().map(|f| f.fallback_question()))
    }

    /// Accept `answer` for the head field and return the next message: the
    /// following question, or the final message once the queue drains.
    pub(super) async fn advance_group_onboarding(
        &self,
        chat_id: &str,
        mut state: OnboardingState,
        answer: &str,
    ) -> Result<Option<String>, ParleyError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        state.ensure_definitions(&self.config.onboarding.group.fields);
        state.accept_answer(answer);

        if let Some(next) = state.head() {
            let question = next.fallback_question();
            store
                .save_onboarding(MemoryScope::Chat, chat_id, &state)
                .await?;
            return Ok(Some(question));
        }

        let now = Utc::now();
        let mut info: Map<String, Value> = state
            .fields_collected
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        info.insert(
            "onboarding_completed_at".into(),
            Value::String(now.to_rfc3339()),
        );
        store.save_group_info(chat_id, &Value::Object(info)).await?;

        state.mark_completed(now);
        store
            .save_onboarding(MemoryScope::Chat, chat_id, &state)
            .await?;
        info!("[{chat_id}] group onboarding complete");
        Ok(Some(self.config.onboarding.group.final_message.clone()))
    }
}
