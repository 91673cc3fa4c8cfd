//! Message pipeline: persistence through delivery for one inbound message.

use std::sync::Arc;

use parley_core::{
    context::Context,
    error::ParleyError,
    message::InboundMessage,
    model::{MemoryScope, Message, Project},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    delivery::DeliveryTarget,
    enrichment::EnrichmentJob,
    persistence::PersistOutcome,
    projects::{resolve, AppliedAction},
    to_history,
    triage::{matches_trigger, Intent},
    Gateway,
};

impl Gateway {
    /// Handle one inbound message end to end. Never fails: unrecoverable
    /// errors are logged and answered with the apology message.
    pub async fn handle_message(self: &Arc<Self>, msg: InboundMessage) {
        info!(
            "[{}] {} says: {}",
            msg.thread_id,
            msg.sender_name.as_deref().unwrap_or(&msg.sender_number),
            msg.preview()
        );

        let _guard = self.locks.acquire(&msg.thread_id).await;
        let cancel = self.cancel.child_token();

        match self.process(&msg, &cancel).await {
            Ok(()) => {}
            Err(ParleyError::Cancelled) => {
                info!("[{}] processing cancelled", msg.thread_id);
            }
            Err(e) => {
                error!("[{}] failed to handle message: {e}", msg.thread_id);
                let target = DeliveryTarget::reply_to(&msg, None);
                self.deliver(&self.prompts.apology, &target).await;
            }
        }
    }

    async fn process(
        self: &Arc<Self>,
        msg: &InboundMessage,
        cancel: &CancellationToken,
    ) -> Result<(), ParleyError> {
        let outcome = self.persist(msg).await;
        if outcome.duplicate {
            info!(
                "[{}] message {} already handled, ignoring redelivery",
                msg.thread_id, msg.message_id
            );
            return Ok(());
        }

        if self.is_self_authored(msg) {
            debug!("[{}] self-authored message, not replying", msg.thread_id);
            return Ok(());
        }

        if let Some(chat_id) = &outcome.chat_id {
            if !msg.text().trim().is_empty() {
                self.spawn_enrichment(EnrichmentJob {
                    thread_id: msg.thread_id.clone(),
                    chat_id: chat_id.clone(),
                    user_id: outcome.sender_user_id.clone(),
                    sender_name: msg.sender_name.clone(),
                    text: msg.text().to_string(),
                });
            }
        }

        let target = DeliveryTarget::reply_to(msg, outcome.chat_id.clone());

        if msg.is_group() {
            if let Some(reply) = self.group_onboarding_turn(msg, &outcome).await? {
                if let Some(text) = reply {
                    self.deliver(&text, &target).await;
                }
                return Ok(());
            }
        }

        let (projects, applied) = self.resolve_projects(msg, &outcome).await;
        let recent = self
            .recent_context(&msg.thread_id, outcome.chat_id.as_deref())
            .await;

        if !msg.is_group() {
            if let Some(reply) = self
                .individual_onboarding_turn(&outcome, &recent, cancel)
                .await?
            {
                self.deliver(&reply, &target).await;
                return Ok(());
            }
        }

        let flow = if msg.is_group() {
            &self.config.onboarding.group
        } else {
            &self.config.onboarding.individual
        };
        let intent = if matches_trigger(msg.text(), &flow.trigger_phrase) {
            info!("[{}] trigger phrase matched", msg.thread_id);
            Intent::OnboardingFlow
        } else {
            self.classify(&recent, &projects, cancel).await
        };

        let reply = match intent {
            Intent::NoReply => {
                debug!("[{}] no reply needed", msg.thread_id);
                return Ok(());
            }
            Intent::SimpleResponse => Some(
                self.generate_reply(msg, &outcome, &recent, &projects, None, cancel)
                    .await?,
            ),
            Intent::OnboardingFlow => {
                self.restart_onboarding(msg, &outcome, &recent, &projects, cancel)
                    .await?
            }
            Intent::ProjectFlow(request) => {
                let note = match (&self.store, outcome.chat_id.as_deref()) {
                    (Some(store), Some(chat_id)) => {
                        match self
                            .apply_project_request(chat_id, &request, &projects, applied.as_ref())
                            .await
                        {
                            Ok(note) => {
                                let refreshed = store
                                    .list_projects(chat_id)
                                    .await
                                    .unwrap_or_else(|_| projects.clone());
                                Some((note, refreshed))
                            }
                            Err(e) => {
                                warn!("[{}] project flow failed: {e}", msg.thread_id);
                                None
                            }
                        }
                    }
                    _ => None,
                };
                let (note, projects) = match note {
                    Some((note, refreshed)) => (Some(note), refreshed),
                    None => (None, projects),
                };
                Some(
                    self.generate_reply(msg, &outcome, &recent, &projects, note.as_deref(), cancel)
                        .await?,
                )
            }
        };

        if let Some(text) = reply {
            self.deliver(&text, &target).await;
        }
        Ok(())
    }

    /// `Some(reply)` when the group dialog consumed this message (the reply
    /// itself may be empty), `None` to continue the pipeline.
    async fn group_onboarding_turn(
        &self,
        msg: &InboundMessage,
        outcome: &PersistOutcome,
    ) -> Result<Option<Option<String>>, ParleyError> {
        let (Some(store), Some(chat_id)) = (&self.store, outcome.chat_id.as_deref()) else {
            return Ok(None);
        };
        match store.load_onboarding(MemoryScope::Chat, chat_id).await {
            Ok(Some(state)) if state.is_active() => {
                let reply = self
                    .advance_group_onboarding(chat_id, state, msg.text())
                    .await?;
                Ok(Some(reply))
            }
            Ok(_) if outcome.is_new_chat && self.config.onboarding.group.is_active() => {
                Ok(Some(self.start_group_onboarding(chat_id).await?))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("[{}] group onboarding state unavailable: {e}", msg.thread_id);
                Ok(None)
            }
        }
    }

    async fn individual_onboarding_turn(
        &self,
        outcome: &PersistOutcome,
        recent: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ParleyError> {
        let (Some(store), Some(user_id)) = (&self.store, outcome.sender_user_id.as_deref()) else {
            return Ok(None);
        };
        if !self.config.onboarding.individual.is_active() {
            return Ok(None);
        }
        let state = match store.load_onboarding(MemoryScope::User, user_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!("[{user_id}] onboarding state unavailable: {e}");
                return Ok(None);
            }
        };
        if !self.needs_individual_onboarding(state.as_ref()) {
            return Ok(None);
        }
        let reply = self
            .advance_individual(user_id, state, false, recent, cancel)
            .await?;
        Ok(Some(reply))
    }

    async fn restart_onboarding(
        &self,
        msg: &InboundMessage,
        outcome: &PersistOutcome,
        recent: &[Message],
        projects: &[Project],
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ParleyError> {
        if let (Some(store), Some(chat_id)) = (&self.store, outcome.chat_id.as_deref()) {
            if msg.is_group() && self.config.onboarding.group.is_active() {
                return self.start_group_onboarding(chat_id).await;
            }
            if !msg.is_group() && self.config.onboarding.individual.is_active() {
                if let Some(user_id) = outcome.sender_user_id.as_deref() {
                    let existing = store
                        .load_onboarding(MemoryScope::User, user_id)
                        .await
                        .unwrap_or_default();
                    let reply = self
                        .advance_individual(user_id, existing, true, recent, cancel)
                        .await?;
                    return Ok(Some(reply));
                }
            }
        }
        let reply = self
            .generate_reply(msg, outcome, recent, projects, None, cancel)
            .await?;
        Ok(Some(reply))
    }

    /// Load projects, run the phrase resolver and apply its side effects.
    /// Failures leave projects unavailable for this turn.
    async fn resolve_projects(
        &self,
        msg: &InboundMessage,
        outcome: &PersistOutcome,
    ) -> (Vec<Project>, Option<AppliedAction>) {
        let (Some(store), Some(chat_id)) = (&self.store, outcome.chat_id.as_deref()) else {
            return (Vec::new(), None);
        };
        let projects = match store.list_projects(chat_id).await {
            Ok(projects) => projects,
            Err(e) => {
                warn!("[{}] projects unavailable: {e}", msg.thread_id);
                return (Vec::new(), None);
            }
        };

        let intent = resolve(msg.text(), &projects);
        let applied = match self.apply_resolution(chat_id, &intent).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("[{}] project resolution failed: {e}", msg.thread_id);
                None
            }
        };
        if applied.is_none() {
            return (projects, None);
        }
        let projects = store.list_projects(chat_id).await.unwrap_or(projects);
        (projects, applied)
    }

    /// Compose a reply from persona, memory profile, live projects and the
    /// recent conversation.
    async fn generate_reply(
        &self,
        msg: &InboundMessage,
        outcome: &PersistOutcome,
        recent: &[Message],
        projects: &[Project],
        note: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, ParleyError> {
        let mut system = self.prompts.persona.clone();

        let profile = self.memory_profile(outcome).await;
        if !profile.is_empty() {
            system.push_str("\n\n");
            system.push_str(&profile);
        }

        let live: Vec<&Project> = projects.iter().filter(|p| p.is_live).collect();
        if !live.is_empty() {
            system.push_str("\n\nActive projects in this chat:");
            for p in live {
                system.push_str(&format!("\n- {}", p.name));
                if let Some(desc) = p.description.as_deref().filter(|d| !d.is_empty()) {
                    system.push_str(&format!(": {desc}"));
                }
                if p.attributes.as_object().is_some_and(|a| !a.is_empty()) {
                    system.push_str(&format!(" {}", p.attributes));
                }
            }
        }

        if let Some(note) = note {
            system.push_str(&format!(
                "\n\nYou just did the following; confirm it briefly: {note}"
            ));
        }

        let history = to_history(recent, msg.is_group());
        let current = if history.is_empty() { msg.text() } else { "" };
        let context = Context::with_history(&system, history, current);
        self.reason(&context, cancel).await
    }

    /// User memory first, then chat memory. Lookup failures leave a section out.
    async fn memory_profile(&self, outcome: &PersistOutcome) -> String {
        let Some(store) = &self.store else {
            return String::new();
        };
        let mut out = String::new();
        let owners = [
            (MemoryScope::User, outcome.sender_user_id.as_deref(), "About the sender:"),
            (MemoryScope::Chat, outcome.chat_id.as_deref(), "About this chat:"),
        ];
        for (scope, owner, heading) in owners {
            let Some(owner) = owner else { continue };
            match store.get_all_memory(scope, owner).await {
                Ok(fields) if !fields.is_empty() => {
                    if !out.is_empty() {
                        out.push_str("\n\n");
                    }
                    out.push_str(heading);
                    for (id, field) in fields {
                        out.push_str(&format!("\n- {id}: {}", field.value));
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("[{owner}] {} memory unavailable: {e}", scope.as_str()),
            }
        }
        out
    }
}
