use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::ledger::model::ReservationId;

struct Entry {
    generation: u64,
    handle: AbortHandle,
}

/// Keyed, cancellable one-shot timers (one per reservation hold).
///
/// A timer removes itself from the registry the moment it fires, before its
/// callback runs, so `cancel` can only ever abort a timer that is still
/// sleeping, never a callback half-way through.
#[derive(Clone, Default)]
pub struct TimerService {
    tasks: Arc<Mutex<HashMap<ReservationId, Entry>>>,
    next_generation: Arc<AtomicU64>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `on_fire` after `delay`. Scheduling an existing key replaces
    /// (and aborts) the previous timer.
    pub fn schedule(&self, key: ReservationId, delay: Duration, on_fire: BoxFuture<'static, ()>) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);

        // Registry lock is held across spawn so the task cannot observe the
        // map before its own entry is in it.
        let mut guard = self.tasks.lock();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut map = tasks.lock();
                if map.get(&key).map(|e| e.generation) == Some(generation) {
                    map.remove(&key);
                }
            }

            debug!(reservation_id = %key, "hold timer fired");
            on_fire.await;
        });

        if let Some(prev) = guard.insert(
            key,
            Entry {
                generation,
                handle: handle.abort_handle(),
            },
        ) {
            prev.handle.abort();
        }
    }

    /// Returns true if a sleeping timer was cancelled.
    pub fn cancel(&self, key: &ReservationId) -> bool {
        match self.tasks.lock().remove(key) {
            Some(entry) => {
                entry.handle.abort();
                debug!(reservation_id = %key, "hold timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, key: &ReservationId) -> bool {
        self.tasks.lock().contains_key(key)
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Entry> = self.tasks.lock().drain().map(|(_, e)| e).collect();
        for e in &drained {
            e.handle.abort();
        }
        drained.len()
    }
}
