//! Worker registry.
//!
//! Maps each source to the state of its most recent capture worker. All access
//! goes through a single lock: the poll loop inserts and evicts, worker units
//! mark themselves finished when their capture process exits.
//!
//! Invariant: at most one entry per source, hence at most one running worker
//! per source.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Handle to a launched worker unit.
#[derive(Debug)]
pub struct WorkerHandle {
    /// Unique worker ID.
    pub id: Uuid,
    /// Locator being captured.
    pub locator: String,
    /// Recording file.
    pub output_path: PathBuf,
    /// Abort handle of the supervising task.
    pub task: AbortHandle,
}

/// Registry entry.
#[derive(Debug)]
struct Worker {
    handle: WorkerHandle,
    running: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub key: String,
    pub id: Uuid,
    pub running: bool,
    pub locator: String,
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Registry of capture workers keyed by source.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: Mutex<HashMap<String, Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entry for `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<WorkerInfo> {
        self.workers.lock().get(key).map(|w| Self::info(key, w))
    }

    /// True iff an entry exists for `key` and it is running.
    pub fn is_active(&self, key: &str) -> bool {
        self.workers
            .lock()
            .get(key)
            .map(|w| w.running)
            .unwrap_or(false)
    }

    /// Remove the entry for `key`. No-op if absent.
    pub fn evict(&self, key: &str) -> Option<WorkerInfo> {
        let removed = self.workers.lock().remove(key);
        removed.map(|w| {
            debug!(source = %key, worker_id = %w.handle.id, "Evicted worker");
            Self::info(key, &w)
        })
    }

    /// Record a newly launched worker for `key` as running.
    ///
    /// The caller guarantees no running entry exists for `key`.
    pub fn insert_running(&self, key: &str, handle: WorkerHandle) {
        let worker = Worker {
            handle,
            running: true,
            started_at: Utc::now(),
            finished_at: None,
        };
        let previous = self.workers.lock().insert(key.to_string(), worker);
        debug_assert!(
            previous.as_ref().is_none_or(|w| !w.running),
            "running worker replaced for {key}"
        );
    }

    /// Flag the worker for `key` as finished.
    ///
    /// Returns `false` when no entry exists, which means the entry was evicted
    /// while its worker was still running.
    pub fn mark_finished(&self, key: &str) -> bool {
        let mut workers = self.workers.lock();
        match workers.get_mut(key) {
            Some(worker) => {
                worker.running = false;
                worker.finished_at = Some(Utc::now());
                true
            }
            None => {
                warn!(source = %key, "Finished worker has no registry entry");
                false
            }
        }
    }

    /// Number of entries, running or finished.
    pub fn len(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.lock().is_empty()
    }

    /// Number of running workers.
    pub fn running_count(&self) -> usize {
        self.workers.lock().values().filter(|w| w.running).count()
    }

    /// Snapshot of every entry, sorted by key.
    pub fn snapshot(&self) -> Vec<WorkerInfo> {
        let mut infos: Vec<_> = self
            .workers
            .lock()
            .iter()
            .map(|(key, w)| Self::info(key, w))
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    /// Abort the supervising task of every running worker.
    pub fn abort_running(&self) -> usize {
        let workers = self.workers.lock();
        let mut aborted = 0;
        for (key, worker) in workers.iter().filter(|(_, w)| w.running) {
            warn!(source = %key, worker_id = %worker.handle.id, "Aborting worker");
            worker.handle.task.abort();
            aborted += 1;
        }
        aborted
    }

    fn info(key: &str, worker: &Worker) -> WorkerInfo {
        WorkerInfo {
            key: key.to_string(),
            id: worker.handle.id,
            running: worker.running,
            locator: worker.handle.locator.clone(),
            output_path: worker.handle.output_path.clone(),
            started_at: worker.started_at,
            finished_at: worker.finished_at,
        }
    }
}
