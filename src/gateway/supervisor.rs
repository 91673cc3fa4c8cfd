//! Supervised background tasks.
//!
//! Every task is spawned through [`Supervisor::spawn`], which logs and counts
//! errors and panics instead of letting them vanish with the `JoinHandle`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parley_core::error::ParleyError;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

#[derive(Default)]
struct Counters {
    spawned: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    running: AtomicU64,
    idle: Notify,
}

#[derive(Clone, Default)]
pub struct Supervisor {
    counters: Arc<Counters>,
}

/// Point-in-time counter values, reported on `/api/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupervisorStats {
    pub spawned: u64,
    pub failed: u64,
    pub panicked: u64,
    pub running: u64,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), ParleyError>> + Send + 'static,
    {
        let name = name.into();
        let counters = self.counters.clone();
        counters.spawned.fetch_add(1, Ordering::Relaxed);
        counters.running.fetch_add(1, Ordering::SeqCst);

        let inner = tokio::spawn(task);
        tokio::spawn(async move {
            match inner.await {
                Ok(Ok(())) => debug!("task {name} finished"),
                Ok(Err(e)) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!("task {name} failed: {e}");
                }
                Err(e) if e.is_panic() => {
                    counters.panicked.fetch_add(1, Ordering::Relaxed);
                    error!("task {name} panicked: {e}");
                }
                Err(e) => debug!("task {name} cancelled: {e}"),
            }
            if counters.running.fetch_sub(1, Ordering::SeqCst) == 1 {
                counters.idle.notify_waiters();
            }
        });
    }

    pub fn stats(&self) -> SupervisorStats {
        SupervisorStats {
            spawned: self.counters.spawned.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            running: self.counters.running.load(Ordering::SeqCst),
        }
    }

    /// Resolve once no supervised task is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.counters.idle.notified();
            if self.counters.running.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}
