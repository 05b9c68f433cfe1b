//! Debounced, batched remote writes.
//!
//! Every enqueue (re)arms a single debounce timer, so a burst of writes
//! collapses into one flush. A flush sends each entry as an independent
//! full-replace upsert and clears the queue before any response arrives.
//! Failed writes are logged and dropped; there is no retry.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use log::{debug, warn};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::document_store::DocumentStore;
use crate::timer::TimerHandle;

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1200);

/// A pending full-replace write.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteQueueEntry {
    pub path: String,
    pub value: Value,
}

#[derive(Default)]
struct QueueState {
    entries: Vec<WriteQueueEntry>,
    timer: Option<TimerHandle>,
}

#[derive(Clone)]
pub struct WriteQueue {
    remote: Arc<dyn DocumentStore>,
    runtime: Handle,
    debounce: Duration,
    state: Arc<Mutex<QueueState>>,
}

impl WriteQueue {
    pub fn new(remote: Arc<dyn DocumentStore>, runtime: Handle, debounce: Duration) -> Self {
        Self {
            remote,
            runtime,
            debounce,
            state: Arc::new(Mutex::new(QueueState::default())),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Write queue mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Queue a write and restart the debounce window.
    ///
    /// A second write to the same path inside the window replaces the first.
    pub fn enqueue(&self, path: String, value: Value) {
        let mut state = self.lock_state();
        match state.entries.iter_mut().find(|e| e.path == path) {
            Some(entry) => entry.value = value,
            None => state.entries.push(WriteQueueEntry { path, value }),
        }

        let queue = self.clone();
        // Assigning drops (and so cancels) any unfired previous timer.
        state.timer = Some(TimerHandle::after(&self.runtime, self.debounce, async move {
            queue.flush();
        }));
    }

    /// Number of entries waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.lock_state().entries.len()
    }

    /// Drain the queue and fire one write per entry without waiting for them.
    pub fn flush(&self) {
        let _ = self.dispatch();
    }

    /// Drain the queue now and wait for every write to settle. Used at
    /// teardown so queued writes are not lost with the process.
    pub async fn flush_now(&self) {
        for handle in join_all(self.dispatch()).await {
            if let Err(e) = handle {
                warn!("Remote write task failed: {}", e);
            }
        }
    }

    fn dispatch(&self) -> Vec<JoinHandle<()>> {
        let batch = {
            let mut state = self.lock_state();
            state.timer = None;
            std::mem::take(&mut state.entries)
        };
        if batch.is_empty() {
            return Vec::new();
        }

        debug!("Flushing {} queued remote write(s)", batch.len());
        batch
            .into_iter()
            .map(|entry| {
                let remote = self.remote.clone();
                self.runtime.spawn(async move {
                    if let Err(e) = remote.put(&entry.path, &entry.value).await {
                        warn!("Remote write to '{}' dropped: {}", entry.path, e);
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::{MemoryDocumentStore, StoreOp};
    use serde_json::json;

    fn queue(remote: &Arc<MemoryDocumentStore>) -> WriteQueue {
        WriteQueue::new(remote.clone(), Handle::current(), DEFAULT_DEBOUNCE)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_flush() {
        let remote = Arc::new(MemoryDocumentStore::new());
        let q = queue(&remote);

        q.enqueue("scope/1/targets/1".into(), json!({"id": "1"}));
        tokio::time::sleep(Duration::from_millis(800)).await;
        q.enqueue("scope/1/targets/2".into(), json!({"id": "2"}));
        tokio::time::sleep(Duration::from_millis(800)).await;
        q.enqueue("scope/1/targets/3".into(), json!({"id": "3"}));

        // 1.6 s after the first write, nothing has gone out yet.
        assert!(remote.ops().is_empty());
        assert_eq!(q.pending(), 3);

        tokio::time::sleep(Duration::from_millis(1300)).await;
        let paths: Vec<String> = remote
            .ops()
            .into_iter()
            .map(|op| match op {
                StoreOp::Put { path, .. } => path,
                StoreOp::Patch { path, .. } => panic!("unexpected patch to {}", path),
            })
            .collect();
        assert_eq!(
            paths,
            vec!["scope/1/targets/1", "scope/1/targets/2", "scope/1/targets/3"]
        );
        assert_eq!(q.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_path_coalesces_to_last_value() {
        let remote = Arc::new(MemoryDocumentStore::new());
        let q = queue(&remote);

        q.enqueue("scope/1/targets/7".into(), json!({"name": "Foo"}));
        q.enqueue("scope/1/targets/7".into(), json!({"name": "Bar"}));
        tokio::time::sleep(Duration::from_millis(1300)).await;

        assert_eq!(
            remote.ops(),
            vec![StoreOp::Put {
                path: "scope/1/targets/7".into(),
                value: json!({"name": "Bar"}),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_now_drains_without_waiting_for_debounce() {
        let remote = Arc::new(MemoryDocumentStore::new());
        let q = queue(&remote);

        q.enqueue("scope/1/targets/9".into(), json!({"id": "9"}));
        q.flush_now().await;

        assert_eq!(remote.ops().len(), 1);
        assert_eq!(q.pending(), 0);

        // The cancelled debounce timer must not produce a second write.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(remote.ops().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_of_empty_queue_is_noop() {
        let remote = Arc::new(MemoryDocumentStore::new());
        let q = queue(&remote);

        q.flush();
        q.flush_now().await;
        assert!(remote.ops().is_empty());
    }
}
