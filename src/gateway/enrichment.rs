//! Background memory enrichment.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parley_core::{context::Context, error::ParleyError, model::MemoryScope};
use parley_memory::merge::merge_suggestions;
use serde_json::Value;
use tracing::{debug, info};

use super::{onboarding::parse_extracted, triage::extract_json_object, Gateway};

/// Where the extracted facts belong.
#[derive(Debug, Clone)]
pub(super) struct EnrichmentJob {
    pub thread_id: String,
    pub chat_id: String,
    pub user_id: Option<String>,
    pub sender_name: Option<String>,
    pub text: String,
}

/// Split an enrichment reply into user and chat suggestions.
pub(super) fn parse_suggestions(raw: &str) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let Some(obj) = extract_json_object(raw)
        .and_then(|json| serde_json::from_str::<Value>(json).ok())
        .and_then(|v| v.as_object().cloned())
    else {
        return (BTreeMap::new(), BTreeMap::new());
    };
    let scope = |key: &str| {
        obj.get(key)
            .filter(|v| v.is_object())
            .map(|v| parse_extracted(&v.to_string()))
            .unwrap_or_default()
    };
    (scope("user"), scope("chat"))
}

impl Gateway {
    fn allowed(&self, scope: MemoryScope, field_id: &str) -> bool {
        if self.config.memory.fields.is_empty() {
            return true;
        }
        self.config
            .memory
            .fields_in(scope)
            .any(|f| f.id == field_id)
    }

    fn enrichment_prompt(&self) -> String {
        if self.config.memory.fields.is_empty() {
            return self.prompts.enrichment.clone();
        }
        let mut prompt = format!("{}\n\nOnly use these field ids:", self.prompts.enrichment);
        for scope in [MemoryScope::User, MemoryScope::Chat] {
            for f in self.config.memory.fields_in(scope) {
                prompt.push_str(&format!("\n- {}.{}: {}", scope.as_str(), f.id, f.description));
            }
        }
        prompt
    }

    /// Queue enrichment for one message on the supervisor.
    pub(super) fn spawn_enrichment(self: &Arc<Self>, job: EnrichmentJob) {
        let gw = self.clone();
        self.supervisor
            .spawn("enrichment", async move { gw.enrich(job).await });
    }

    async fn enrich(&self, job: EnrichmentJob) -> Result<(), ParleyError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let speaker = job.sender_name.as_deref().unwrap_or("User");
        let context = Context::with_history(
            &self.enrichment_prompt(),
            Vec::new(),
            &format!("{speaker}: {}", job.text),
        )
        .json();
        let cancel = self.cancel.child_token();
        let raw = self.reason(&context, &cancel).await?;

        let (user, chat) = parse_suggestions(&raw);
        let user: BTreeMap<_, _> = user
            .into_iter()
            .filter(|(id, _)| self.allowed(MemoryScope::User, id))
            .collect();
        let chat: BTreeMap<_, _> = chat
            .into_iter()
            .filter(|(id, _)| self.allowed(MemoryScope::Chat, id))
            .collect();
        if user.is_empty() && chat.is_empty() {
            debug!("[{}] enrichment: nothing to remember", job.thread_id);
            return Ok(());
        }

        let _guard = self.locks.acquire(&job.thread_id).await;

        let targets = [
            (MemoryScope::User, job.user_id.as_deref(), user),
            (MemoryScope::Chat, Some(job.chat_id.as_str()), chat),
        ];
        for (scope, owner, suggested) in targets {
            let Some(owner) = owner else { continue };
            if suggested.is_empty() {
                continue;
            }
            let existing = store.get_all_memory(scope, owner).await?;
            let applied = merge_suggestions(
                &existing,
                &suggested,
                |id| self.config.memory.policy_for(id),
                Utc::now(),
            );
            for (field_id, field) in &applied {
                store.set_memory_field(scope, owner, field_id, field).await?;
            }
            if !applied.is_empty() {
                info!(
                    "[{}] enrichment updated {} {} field(s)",
                    job.thread_id,
                    applied.len(),
                    scope.as_str()
                );
            }
        }
        Ok(())
    }
}
