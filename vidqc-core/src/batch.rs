//! Batch Store (§4.7): a bounded, TTL-evicting map of batch job status,
//! guarded by `parking_lot::RwLock` the way the rest of this workspace
//! guards shared in-process state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::BatchError;
use crate::orchestrator::ContentOrchestrator;
use crate::CancellationToken;

const DEFAULT_CAPACITY: usize = 1000;
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    Queued,
    Running { completed: u32, total: u32 },
    Completed,
    Failed { reason: String },
}

struct Entry {
    status: BatchStatus,
    inserted_at: Instant,
}

struct Inner {
    entries: std::collections::HashMap<Uuid, Entry>,
    insertion_order: VecDeque<Uuid>,
}

/// Oldest-first eviction on insert-at-capacity, plus a background sweep
/// that drops anything past `ttl` regardless of capacity pressure.
pub struct BatchStore {
    inner: RwLock<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl Default for BatchStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl BatchStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: std::collections::HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn put(&self, id: Uuid, status: BatchStatus) {
        let mut inner = self.inner.write();
        if !inner.entries.contains_key(&id) {
            inner.insertion_order.push_back(id);
        }
        inner.entries.insert(id, Entry { status, inserted_at: Instant::now() });

        while inner.entries.len() > self.capacity {
            if let Some(oldest) = inner.insertion_order.pop_front() {
                inner.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Option<BatchStatus> {
        let inner = self.inner.read();
        let entry = inner.entries.get(&id)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.status.clone())
    }

    pub fn remove(&self, id: Uuid) -> Result<(), BatchError> {
        let mut inner = self.inner.write();
        inner.entries.remove(&id).map(|_| ()).ok_or(BatchError::NotFound(id))
    }

    fn sweep(&self) {
        let mut inner = self.inner.write();
        let ttl = self.ttl;
        inner.entries.retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
        inner.insertion_order.retain(|id| inner.entries.contains_key(id));
    }

    pub fn spawn_sweeper(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                store.sweep();
            }
        })
    }
}

/// A handle to a submitted batch; `id` is the key to pass back to
/// [`BatchRunner::get_batch`].
#[derive(Debug, Clone, Copy)]
pub struct BatchHandle {
    pub id: Uuid,
}

/// Surface A's `submit_batch`/`get_batch` pair (§6): runs each input
/// through the [`ContentOrchestrator`] sequentially, publishing progress
/// into the [`BatchStore`] as it goes, and returns the handle immediately
/// rather than waiting for the batch to finish.
pub struct BatchRunner {
    store: Arc<BatchStore>,
    orchestrator: Arc<ContentOrchestrator>,
}

impl BatchRunner {
    pub fn new(store: Arc<BatchStore>, orchestrator: Arc<ContentOrchestrator>) -> Self {
        Self { store, orchestrator }
    }

    pub fn submit_batch(&self, inputs: Vec<String>) -> BatchHandle {
        let id = Uuid::new_v4();
        let total = inputs.len() as u32;
        self.store.put(id, BatchStatus::Running { completed: 0, total });

        let store = self.store.clone();
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            let mut completed = 0u32;
            let mut any_failed = false;
            for input in inputs {
                let token = CancellationToken::new();
                if let Err(err) = orchestrator.analyze(&input, &token).await {
                    any_failed = true;
                    tracing::warn!(input, error = %err, "batch item failed");
                }
                completed += 1;
                store.put(id, BatchStatus::Running { completed, total });
            }

            let final_status = if any_failed {
                BatchStatus::Failed { reason: "one or more inputs failed".to_owned() }
            } else {
                BatchStatus::Completed
            };
            store.put(id, final_status);
        });

        BatchHandle { id }
    }

    pub fn get_batch(&self, id: Uuid) -> Option<BatchStatus> {
        self.store.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_first_eviction_keeps_the_most_recent_n() {
        let store = BatchStore::new(3, DEFAULT_TTL);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let d = Uuid::new_v4();

        store.put(a, BatchStatus::Queued);
        store.put(b, BatchStatus::Queued);
        store.put(c, BatchStatus::Queued);
        store.put(d, BatchStatus::Queued);

        assert!(store.get(a).is_none());
        assert!(store.get(b).is_some());
        assert!(store.get(c).is_some());
        assert!(store.get(d).is_some());
    }

    #[tokio::test]
    async fn submit_batch_publishes_progress_and_a_terminal_status() {
        let store = Arc::new(BatchStore::default());
        let orchestrator = Arc::new(ContentOrchestrator::default());
        let runner = BatchRunner::new(store.clone(), orchestrator);

        let handle = runner.submit_batch(vec!["/no/such/input.mp4".to_owned()]);
        assert!(matches!(
            runner.get_batch(handle.id),
            Some(BatchStatus::Running { .. }) | Some(BatchStatus::Completed) | Some(BatchStatus::Failed { .. })
        ));

        for _ in 0..50 {
            match runner.get_batch(handle.id) {
                Some(BatchStatus::Completed) | Some(BatchStatus::Failed { .. }) => break,
                _ => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        // A nonexistent input cannot succeed, so the terminal status must be Failed.
        assert!(matches!(runner.get_batch(handle.id), Some(BatchStatus::Failed { .. })));
    }

    #[test]
    fn get_on_unknown_id_is_none() {
        let store = BatchStore::default();
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn remove_on_unknown_id_returns_not_found() {
        let store = BatchStore::default();
        let id = Uuid::new_v4();
        assert!(matches!(store.remove(id), Err(BatchError::NotFound(found)) if found == id));
    }

    #[test]
    fn re_inserting_an_existing_id_does_not_grow_insertion_order() {
        let store = BatchStore::new(2, DEFAULT_TTL);
        let a = Uuid::new_v4();
        store.put(a, BatchStatus::Queued);
        store.put(a, BatchStatus::Completed);
        assert_eq!(store.get(a), Some(BatchStatus::Completed));
    }

    #[test]
    fn entries_past_ttl_are_treated_as_absent_even_before_a_sweep() {
        let store = BatchStore::new(DEFAULT_CAPACITY, Duration::from_millis(1));
        let id = Uuid::new_v4();
        store.put(id, BatchStatus::Queued);
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get(id).is_none());
    }
}
