//! Individual onboarding: re-extract every field from the whole conversation
//! each turn, ask for what is still missing.

use std::collections::BTreeMap;

use chrono::Utc;
use parley_core::{
    context::Context,
    error::ParleyError,
    model::{MemoryScope, Message, MergePolicy},
    onboarding::{FieldDefinition, OnboardingState},
};
use parley_memory::merge::merge_suggestions;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{render_transcript, to_history, triage::extract_json_object, Gateway};

/// Parse an extraction reply into `field id -> value`. Scalars are rendered
/// as text; nulls, arrays and objects are ignored.
pub(super) fn parse_extracted(raw: &str) -> BTreeMap<String, String> {
    let Some(json) = extract_json_object(raw) else {
        return BTreeMap::new();
    };
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(json) else {
        return BTreeMap::new();
    };
    obj.into_iter()
        .filter_map(|(k, v)| {
            let text = match v {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k, text))
        })
        .collect()
}

fn render_fields(fields: &[&FieldDefinition]) -> String {
    fields
        .iter()
        .map(|f| format!("- {}: {}", f.id, f.description))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Gateway {
    /// Whether this user still has to go through individual onboarding.
    /// An absent record means onboarding has never run.
    pub(super) fn needs_individual_onboarding(&self, state: Option<&OnboardingState>) -> bool {
        self.config.onboarding.individual.is_active() && !state.is_some_and(|s| s.completed)
    }

    /// Run one turn of the individual dialog and return the text to send.
    /// With `restart` set, any previous record is discarded first.
    pub(super) async fn advance_individual(
        &self,
        user_id: &str,
        existing: Option<OnboardingState>,
        restart: bool,
        recent: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String, ParleyError> {
        let Some(store) = &self.store else {
            return Err(ParleyError::Store("no durable store".into()));
        };
        let flow = &self.config.onboarding.individual;
        let now = Utc::now();

        let mut state = match existing {
            Some(state) if !restart && state.is_active() => state,
            _ => {
                info!("[{user_id}] starting individual onboarding");
                OnboardingState::start(&flow.fields, now)
            }
        };
        state.ensure_definitions(&flow.fields);

        let extracted = self.extract_fields(&state, recent, cancel).await;
        state.absorb_extracted(&extracted);

        if state.missing_required().is_empty() {
            state.mark_completed(now);
            store
                .save_onboarding(MemoryScope::User, user_id, &state)
                .await?;
            self.write_profile(user_id, &state.fields_collected).await;
            info!("[{user_id}] individual onboarding complete");
            return Ok(flow.final_message.clone());
        }

        store
            .save_onboarding(MemoryScope::User, user_id, &state)
            .await?;
        Ok(self.next_question(&state, recent, cancel).await)
    }

    async fn extract_fields(
        &self,
        state: &OnboardingState,
        recent: &[Message],
        cancel: &CancellationToken,
    ) -> BTreeMap<String, String> {
        let defs: Vec<&FieldDefinition> = state
            .field_order
            .iter()
            .filter_map(|id| state.field_definitions.get(id))
            .collect();
        let system = format!(
            "{}\n\nFields:\n{}",
            self.prompts.extraction,
            render_fields(&defs)
        );
        let context =
            Context::with_history(&system, Vec::new(), &render_transcript(recent)).json();

        match self.reason(&context, cancel).await {
            Ok(raw) => parse_extracted(&raw),
            Err(e) => {
                warn!("onboarding extraction failed: {e}");
                BTreeMap::new()
            }
        }
    }

    async fn next_question(
        &self,
        state: &OnboardingState,
        recent: &[Message],
        cancel: &CancellationToken,
    ) -> String {
        let missing = state.missing_fields();
        let fallback = state
            .missing_required()
            .first()
            .or(missing.first())
            .map(|f| f.fallback_question())
            .unwrap_or_default();

        let system = format!(
            "{}\n\n{}\n\nStill missing:\n{}",
            self.prompts.persona,
            self.prompts.question,
            render_fields(&missing)
        );
        let context = Context::with_history(&system, to_history(recent, false), "");

        match self.reason(&context, cancel).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => fallback,
            Err(e) => {
                warn!("onboarding question generation failed: {e}");
                fallback
            }
        }
    }

    /// Write collected values into the user's memory with replace semantics.
    async fn write_profile(&self, user_id: &str, collected: &BTreeMap<String, String>) {
        let Some(store) = &self.store else {
            return;
        };
        let existing = match store.get_all_memory(MemoryScope::User, user_id).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!("[{user_id}] memory unavailable, profile not written: {e}");
                return;
            }
        };
        let applied = merge_suggestions(
            &existing,
            collected,
            |_| Some(MergePolicy::Replace),
            Utc::now(),
        );
        for (field_id, field) in &applied {
            if let Err(e) = store
                .set_memory_field(MemoryScope::User, user_id, field_id, field)
                .await
            {
                warn!("[{user_id}] failed to write memory field {field_id}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extracted_scalars_only() {
        let parsed = parse_extracted(
            r#"Here you go: {"name": "Ana", "age": 31, "email": "", "tags": ["x"], "nick": null}"#,
        );
        assert_eq!(parsed.get("name").map(String::as_str), Some("Ana"));
        assert_eq!(parsed.get("age").map(String::as_str), Some("31"));
        assert_eq!(parsed.get("email").map(String::as_str), Some(""));
        assert!(!parsed.contains_key("tags"));
        assert!(!parsed.contains_key("nick"));
    }

    #[test]
    fn test_parse_extracted_garbage_is_empty() {
        assert!(parse_extracted("no idea").is_empty());
    }
}
