//! Gateway: the orchestrator between the webhook, the store, the reasoning
//! service and the delivery channel.
//!
//! - `persistence` writes every inbound message (durable store, cache fallback)
//! - `triage` classifies what the agent should do
//! - `projects` resolves project lifecycle phrases and applies project flows
//! - `onboarding` / `group_onboarding` drive the two onboarding dialogs
//! - `enrichment` merges extracted facts into memory in the background
//! - `delivery` persists and sends replies
//! - `pipeline` ties them together in `handle_message`

mod delivery;
mod enrichment;
mod group_onboarding;
mod locks;
mod onboarding;
mod persistence;
mod pipeline;
mod projects;
mod supervisor;
mod triage;

#[cfg(test)]
pub(crate) mod testing;

pub use supervisor::Supervisor;

use locks::ChatLocks;

use std::sync::Arc;
use std::time::Duration;

use parley_core::{
    config::{Config, Prompts},
    context::{Context, ContextEntry},
    error::ParleyError,
    message::InboundMessage,
    model::{Message, MessageRole},
    traits::{Channel, ChatStore, Provider},
};
use parley_memory::EphemeralCache;
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The central gateway that routes inbound messages to replies.
pub struct Gateway {
    pub(super) provider: Arc<dyn Provider>,
    pub(super) channel: Arc<dyn Channel>,
    /// `None` when the durable store could not be opened (cache-only mode).
    pub(super) store: Option<Arc<dyn ChatStore>>,
    pub(super) cache: EphemeralCache,
    pub(super) config: Config,
    pub(super) prompts: Prompts,
    pub(super) locks: ChatLocks,
    pub(super) supervisor: Supervisor,
    /// Root token; cancelled on shutdown. Each message works on a child.
    pub(super) cancel: CancellationToken,
}

impl Gateway {
    pub fn new(
        provider: Arc<dyn Provider>,
        channel: Arc<dyn Channel>,
        store: Option<Arc<dyn ChatStore>>,
        config: Config,
        prompts: Prompts,
        cancel: CancellationToken,
    ) -> Self {
        let cache = EphemeralCache::new(
            config.memory.cache_capacity,
            config.memory.cache_max_threads,
        );
        Self {
            provider,
            channel,
            store,
            cache,
            config,
            prompts,
            locks: ChatLocks::new(),
            supervisor: Supervisor::new(),
            cancel,
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Consume inbound messages until the channel closes or shutdown is
    /// requested. Each message runs on its own task; per-chat ordering is
    /// enforced by the chat lock inside `handle_message`.
    ///
    /// On shutdown, messages still queued are handled too (they are persisted
    /// even though their reasoning calls are cancelled), and every handler and
    /// background task gets up to 10 seconds to finish.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<InboundMessage>) {
        info!(
            "{} gateway running | provider: {} | channel: {} | store: {}",
            self.config.parley.name,
            self.provider.name(),
            self.channel.name(),
            if self.store.is_some() {
                "sqlite"
            } else {
                "cache-only"
            },
        );

        let mut handlers = JoinSet::new();
        loop {
            tokio::select! {
                incoming = rx.recv() => {
                    let Some(incoming) = incoming else {
                        info!("inbound channel closed");
                        break;
                    };
                    self.spawn_handler(&mut handlers, incoming);
                }
                Some(done) = handlers.join_next(), if !handlers.is_empty() => {
                    log_handler_exit(done);
                }
                _ = self.cancel.cancelled() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        rx.close();
        while let Some(queued) = rx.recv().await {
            self.spawn_handler(&mut handlers, queued);
        }

        info!(
            "Shutting down, waiting for {} handlers and background tasks...",
            handlers.len()
        );
        let drain = async {
            while let Some(done) = handlers.join_next().await {
                log_handler_exit(done);
            }
            self.supervisor.wait_idle().await;
        };
        if tokio::time::timeout(Duration::from_secs(10), drain).await.is_err() {
            warn!("tasks still running at shutdown, aborting them");
        }
        info!("Shutdown complete.");
    }

    fn spawn_handler(self: &Arc<Self>, handlers: &mut JoinSet<()>, msg: InboundMessage) {
        let gw = self.clone();
        handlers.spawn(async move {
            gw.handle_message(msg).await;
        });
    }

    /// Single reasoning call, bounded by the provider deadline and the
    /// caller's cancellation token.
    pub(super) async fn reason(
        &self,
        context: &Context,
        cancel: &CancellationToken,
    ) -> Result<String, ParleyError> {
        let secs = self.config.provider.timeout_secs;
        debug!(
            "reasoning call: {} history entries, json_mode={}",
            context.history.len(),
            context.json_mode
        );
        tokio::select! {
            _ = cancel.cancelled() => Err(ParleyError::Cancelled),
            res = tokio::time::timeout(Duration::from_secs(secs), self.provider.complete(context)) => {
                match res {
                    Ok(reply) => reply.map(|m| m.text),
                    Err(_) => Err(ParleyError::Timeout(secs)),
                }
            }
        }
    }
}

fn log_handler_exit(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        if e.is_panic() {
            error!("message handler panicked: {e}");
        }
    }
}

/// Render messages as `Name: text` lines for classifier and extractor prompts.
pub(super) fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let who = match m.role {
                MessageRole::Agent => "Assistant",
                MessageRole::User => m.sender_name.as_deref().unwrap_or("User"),
            };
            format!("{who}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Role-tagged history for reply generation. In groups each user line is
/// prefixed with the speaker's name.
pub(super) fn to_history(messages: &[Message], is_group: bool) -> Vec<ContextEntry> {
    messages
        .iter()
        .map(|m| match m.role {
            MessageRole::Agent => ContextEntry::assistant(m.content.clone()),
            MessageRole::User if is_group => ContextEntry::user(format!(
                "{}: {}",
                m.sender_name.as_deref().unwrap_or("Someone"),
                m.content
            )),
            MessageRole::User => ContextEntry::user(m.content.clone()),
        })
        .collect()
}
