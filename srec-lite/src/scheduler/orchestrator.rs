//! Poll orchestrator.
//!
//! One long-lived control flow: reload the source list, check every source in
//! order, dispatch a worker for each live one, wait, repeat. Sources are
//! checked one at a time; capture workers run concurrently and are never
//! awaited here.
//!
//! ```text
//!   ┌──────┐ load list ┌─────────┐ check + dispatch per source
//!   │ Idle │──────────►│ Cycling │──────────────┐
//!   └──────┘◄──────────└─────────┘              │
//!       ▲     pass done                          │
//!       └─────── sleep(interval) / cancelled ◄───┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::monitor::{LiveStatus, LivenessChecker};
use crate::sources::SourceListProvider;
use crate::worker::{DispatchOutcome, WorkerManager};

/// Poll loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait between the end of one pass and the start of the next.
    pub interval: Duration,
    /// Wait before retrying a failed source list load.
    pub source_retry_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(31),
            source_retry_delay: Duration::from_secs(10),
        }
    }
}

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Between cycles.
    Idle,
    /// Processing the current source list.
    Cycling,
}

/// Tally of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sources: usize,
    pub live: usize,
    pub offline: usize,
    pub fetch_errors: usize,
    pub launched: usize,
    pub already_running: usize,
    pub dispatch_failures: usize,
}

/// Top-level cyclic driver.
pub struct PollOrchestrator {
    sources: Arc<dyn SourceListProvider>,
    checker: Arc<LivenessChecker>,
    workers: Arc<WorkerManager>,
    config: PollConfig,
    cancellation_token: CancellationToken,
    state_tx: watch::Sender<OrchestratorState>,
}

impl PollOrchestrator {
    pub fn new(
        sources: Arc<dyn SourceListProvider>,
        checker: Arc<LivenessChecker>,
        workers: Arc<WorkerManager>,
        config: PollConfig,
        cancellation_token: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(OrchestratorState::Idle);
        Self {
            sources,
            checker,
            workers,
            config,
            cancellation_token,
            state_tx,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<OrchestratorState> {
        self.state_tx.subscribe()
    }

    pub fn workers(&self) -> &Arc<WorkerManager> {
        &self.workers
    }

    /// Run cycles until the cancellation token fires.
    ///
    /// Cancellation is observed between cycles and during waits. A pass in
    /// progress finishes its current check but starts no further captures.
    /// Returns the number of completed cycles.
    pub async fn run(&self) -> u64 {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Poll loop started"
        );
        let mut cycles = 0u64;

        loop {
            if self.cancellation_token.is_cancelled() {
                break;
            }

            let Some(sources) = self.load_sources().await else {
                break;
            };

            let report = self.run_cycle(&sources).await;
            cycles += 1;
            debug!(cycle = cycles, ?report, "Cycle complete");

            info!(
                "Waiting {} seconds before we check the sources again",
                self.config.interval.as_secs()
            );
            tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!(cycles, "Poll loop stopped");
        cycles
    }

    /// Load the source list once and run a single pass over it.
    pub async fn run_once(&self) -> Result<CycleReport> {
        let sources = self.sources.load().await?;
        Ok(self.run_cycle(&sources).await)
    }

    /// Load the source list, retrying after a delay on failure.
    ///
    /// Returns `None` if cancelled while waiting.
    async fn load_sources(&self) -> Option<Vec<String>> {
        loop {
            match self.sources.load().await {
                Ok(sources) => return Some(sources),
                Err(e) => {
                    warn!(
                        error = %e,
                        "Error while reading the source list, trying again in {} seconds",
                        self.config.source_retry_delay.as_secs()
                    );
                }
            }

            tokio::select! {
                _ = self.cancellation_token.cancelled() => return None,
                _ = tokio::time::sleep(self.config.source_retry_delay) => {}
            }
        }
    }

    /// Check every source in order and dispatch workers for live ones.
    pub async fn run_cycle(&self, sources: &[String]) -> CycleReport {
        self.state_tx.send_replace(OrchestratorState::Cycling);
        let mut report = CycleReport {
            sources: sources.len(),
            ..Default::default()
        };

        for source in sources {
            let status = match self.checker.check(source).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(source = %source, error = %e, "Liveness check failed, skipping");
                    report.fetch_errors += 1;
                    continue;
                }
            };

            let locator = match status {
                LiveStatus::Live { locator } => locator,
                LiveStatus::Offline => {
                    info!(source = %source, "Source is offline");
                    report.offline += 1;
                    continue;
                }
            };

            info!(source = %source, "Assuming stream is running");
            report.live += 1;

            // A capture started now would only be stopped again.
            if self.cancellation_token.is_cancelled() {
                debug!(source = %source, "Shutdown requested, not starting capture");
                break;
            }

            match self.workers.dispatch(source, &locator).await {
                Ok(DispatchOutcome::Launched) => report.launched += 1,
                Ok(DispatchOutcome::AlreadyRunning) => report.already_running += 1,
                Err(e) => {
                    error!(source = %source, error = %e, "Failed to start capture");
                    report.dispatch_failures += 1;
                }
            }
        }

        self.state_tx.send_replace(OrchestratorState::Idle);
        report
    }
}
