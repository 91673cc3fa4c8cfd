//! Bounded in-process message window per thread.
//!
//! Secondary context source: written on every inbound message and read when
//! the durable store is unavailable or empty. Agent-authored messages are
//! never retained. Each thread keeps at most `capacity` messages (oldest
//! dropped first) and at most `max_threads` threads are kept (the thread
//! written least recently is evicted).

use std::collections::{HashMap, VecDeque};

use parley_core::model::{Message, MessageRole};
use tokio::sync::Mutex;
use tracing::debug;

struct ThreadWindow {
    messages: VecDeque<Message>,
    last_write: u64,
}

struct CacheInner {
    threads: HashMap<String, ThreadWindow>,
    clock: u64,
}

pub struct EphemeralCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    max_threads: usize,
}

impl EphemeralCache {
    pub fn new(capacity: usize, max_threads: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                threads: HashMap::new(),
                clock: 0,
            }),
            capacity: capacity.max(1),
            max_threads: max_threads.max(1),
        }
    }

    /// Record a message for `thread_id`. Returns `true` when the thread had
    /// never been seen before.
    pub async fn record(&self, thread_id: &str, message: Message) -> bool {
        let mut inner = self.inner.lock().await;
        inner.clock += 1;
        let now = inner.clock;

        let is_new = !inner.threads.contains_key(thread_id);
        if is_new && inner.threads.len() >= self.max_threads {
            evict_oldest(&mut inner.threads);
        }

        let window = inner
            .threads
            .entry(thread_id.to_string())
            .or_insert_with(|| ThreadWindow {
                messages: VecDeque::new(),
                last_write: now,
            });
        window.last_write = now;

        if message.role != MessageRole::Agent {
            window.messages.push_back(message);
            while window.messages.len() > self.capacity {
                window.messages.pop_front();
            }
        }
        is_new
    }

    /// Up to `limit` most recent messages of a thread, oldest first.
    pub async fn recent(&self, thread_id: &str, limit: usize) -> Vec<Message> {
        let inner = self.inner.lock().await;
        let Some(window) = inner.threads.get(thread_id) else {
            return Vec::new();
        };
        let skip = window.messages.len().saturating_sub(limit);
        window.messages.iter().skip(skip).cloned().collect()
    }

    #[cfg(test)]
    async fn contains(&self, thread_id: &str) -> bool {
        self.inner.lock().await.threads.contains_key(thread_id)
    }

    #[cfg(test)]
    async fn thread_count(&self) -> usize {
        self.inner.lock().await.threads.len()
    }
}

fn evict_oldest(threads: &mut HashMap<String, ThreadWindow>) {
    let oldest = threads
        .iter()
        .min_by_key(|(_, w)| w.last_write)
        .map(|(id, _)| id.clone());
    if let Some(id) = oldest {
        debug!("cache: evicting thread {id}");
        threads.remove(&id);
    }
}
