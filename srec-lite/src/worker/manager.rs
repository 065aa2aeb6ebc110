//! Worker lifecycle manager.
//!
//! Turns "source is live at this locator" into at most one running capture
//! worker per source:
//! - launches the capture through a [`CaptureInvoker`]
//! - records the worker in the [`WorkerRegistry`]
//! - marks it finished when the capture process exits
//!
//! Worker units are spawned on a `TaskTracker`. The poll loop never waits for
//! them; `shutdown` does.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::registry::{WorkerHandle, WorkerRegistry};
use crate::recorder::{CaptureInvoker, CaptureRequest};
use crate::{Error, Result};

/// Result of a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A new worker was started.
    Launched,
    /// A worker for the source is still running; nothing was started.
    AlreadyRunning,
}

/// Events emitted by the worker manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// A worker was launched and registered.
    Launched {
        source: String,
        worker_id: Uuid,
        locator: String,
        output_path: PathBuf,
    },
    /// A worker's capture process exited and the worker was marked finished.
    Finished { source: String, worker_id: Uuid },
}

/// Creates, launches and finalizes capture workers.
pub struct WorkerManager {
    registry: Arc<WorkerRegistry>,
    invoker: Arc<dyn CaptureInvoker>,
    output_dir: PathBuf,
    tracker: TaskTracker,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl WorkerManager {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        invoker: Arc<dyn CaptureInvoker>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            registry,
            invoker,
            output_dir: output_dir.into(),
            tracker: TaskTracker::new(),
            event_tx,
        }
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Subscribe to worker events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Number of worker units that have not terminated yet.
    pub fn live_units(&self) -> usize {
        self.tracker.len()
    }

    /// Ensure a worker is capturing `key` from `locator`.
    ///
    /// A launch failure leaves the registry exactly as it was, so the next
    /// cycle retries.
    pub async fn dispatch(&self, key: &str, locator: &str) -> Result<DispatchOutcome> {
        if self.registry.is_active(key) {
            info!(source = %key, "Already recording");
            return Ok(DispatchOutcome::AlreadyRunning);
        }

        let request = CaptureRequest::new(locator, key, &self.output_dir);
        let session = self.invoker.launch(request).await.map_err(|e| match e {
            Error::Dispatch { .. } => e,
            other => Error::dispatch(key, other.to_string()),
        })?;
        let (output_path, completion) = session.into_parts();

        let worker_id = Uuid::new_v4();
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let registry = Arc::clone(&self.registry);
        let event_tx = self.event_tx.clone();
        let source = key.to_string();
        let task = self.tracker.spawn(async move {
            completion.await;

            // The entry is inserted after spawning; never mark before it exists.
            let _ = registered_rx.await;

            registry.mark_finished(&source);
            info!(source = %source, %worker_id, "Recording finished");
            let _ = event_tx.send(WorkerEvent::Finished { source, worker_id });
        });

        if let Some(previous) = self.registry.evict(key) {
            debug!(
                source = %key,
                previous_worker = %previous.id,
                "Replacing finished worker"
            );
        }

        self.registry.insert_running(
            key,
            WorkerHandle {
                id: worker_id,
                locator: locator.to_string(),
                output_path: output_path.clone(),
                task: task.abort_handle(),
            },
        );
        let _ = registered_tx.send(());

        info!(
            source = %key,
            %worker_id,
            file = %output_path.display(),
            "Launched capture worker"
        );
        let _ = self.event_tx.send(WorkerEvent::Launched {
            source: key.to_string(),
            worker_id,
            locator: locator.to_string(),
            output_path,
        });

        Ok(DispatchOutcome::Launched)
    }

    /// Wait up to `grace` for every worker unit to terminate, then abort the rest.
    ///
    /// Returns the number of workers that had to be aborted.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.tracker.close();

        if self.tracker.is_empty() {
            return 0;
        }

        info!(
            workers = self.tracker.len(),
            "Waiting for capture workers to finish"
        );
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => 0,
            Err(_) => {
                let aborted = self.registry.abort_running();
                if aborted > 0 {
                    error!(aborted, "Capture workers did not finish in time");
                } else {
                    warn!("Worker units still pending after grace period");
                }
                aborted
            }
        }
    }
}
