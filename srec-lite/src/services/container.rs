//! Service container.
//!
//! Wires the poll loop from configuration and owns the shutdown token.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::config::AppConfig;
use crate::monitor::{HttpPageFetcher, LivenessChecker, LocatorMatcher};
use crate::recorder::{CaptureInvoker, FfmpegCapture};
use crate::scheduler::PollOrchestrator;
use crate::sources::{FileSourceList, SourceListProvider};
use crate::utils::http_client::build_probe_client;
use crate::worker::{WorkerManager, WorkerRegistry};

/// Extra time the container waits beyond ffmpeg's own grace period.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(5);

/// Service container holding the running application.
pub struct ServiceContainer {
    /// Poll loop.
    pub orchestrator: PollOrchestrator,
    /// Worker manager shared with the poll loop.
    pub worker_manager: Arc<WorkerManager>,
    shutdown_grace: Duration,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Build the production wiring: file source list, HTTP probe, ffmpeg capture.
    ///
    /// Fails if the source list does not exist.
    pub fn from_config(config: &AppConfig, config_dir: &Path, output_dir: &Path) -> Result<Self> {
        config.validate()?;

        let sources = FileSourceList::new(config.sources_path(config_dir));
        sources.ensure_exists()?;

        let client = build_probe_client(&config.http_options())?;
        let fetcher = Arc::new(HttpPageFetcher::new(client));

        let cancellation_token = CancellationToken::new();
        let capture = FfmpegCapture::new(config.ffmpeg_config(), cancellation_token.clone());
        match capture.detect_version() {
            Some(version) => info!(%version, "Found ffmpeg"),
            None => warn!(
                path = %config.ffmpeg_path,
                "ffmpeg could not be run; captures will fail until it is installed"
            ),
        }

        Self::with_parts(
            Arc::new(sources),
            fetcher,
            Arc::new(capture),
            config,
            output_dir.to_path_buf(),
            cancellation_token,
        )
    }

    /// Build from explicit collaborators.
    pub fn with_parts(
        sources: Arc<dyn SourceListProvider>,
        fetcher: Arc<dyn crate::monitor::PageFetcher>,
        invoker: Arc<dyn CaptureInvoker>,
        config: &AppConfig,
        output_dir: PathBuf,
        cancellation_token: CancellationToken,
    ) -> Result<Self> {
        let matcher = Arc::new(LocatorMatcher::new()?);
        let checker = Arc::new(LivenessChecker::new(
            fetcher,
            matcher,
            config.probe_url_template.clone(),
        )?);

        let worker_manager = Arc::new(WorkerManager::new(
            Arc::new(WorkerRegistry::new()),
            invoker,
            output_dir,
        ));

        let orchestrator = PollOrchestrator::new(
            sources,
            checker,
            Arc::clone(&worker_manager),
            config.poll_config(),
            cancellation_token.clone(),
        );

        Ok(Self {
            orchestrator,
            worker_manager,
            shutdown_grace: config.shutdown_grace() + SHUTDOWN_SLACK,
            cancellation_token,
        })
    }

    /// Run the poll loop until shutdown, then wait for the workers.
    pub async fn run(&self) -> u64 {
        info!(
            output_dir = %self.worker_manager.output_dir().display(),
            "Starting poll loop"
        );
        let cycles = self.orchestrator.run().await;

        let aborted = self.worker_manager.shutdown(self.shutdown_grace).await;
        if aborted > 0 {
            warn!(aborted, "Some recordings were aborted during shutdown");
        }
        info!(cycles, "Shutdown complete");
        cycles
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.cancellation_token.cancel();
    }

    /// Get the cancellation token for external use.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Check if shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_missing_source_list_is_config_error() {
        let config_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();

        let result =
            ServiceContainer::from_config(&AppConfig::default(), config_dir.path(), output_dir.path());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config_dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        let result = ServiceContainer::from_config(&config, config_dir.path(), config_dir.path());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_run_after_shutdown_returns_immediately() {
        let config_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        std::fs::write(config_dir.path().join("sources.txt"), "alice\n").unwrap();

        let config = AppConfig {
            ffmpeg_path: config_dir
                .path()
                .join("missing-ffmpeg")
                .to_string_lossy()
                .to_string(),
            ..Default::default()
        };
        let container =
            ServiceContainer::from_config(&config, config_dir.path(), output_dir.path()).unwrap();

        container.shutdown();
        assert!(container.is_shutting_down());
        assert_eq!(container.run().await, 0);
        assert!(container.worker_manager.registry().is_empty());
    }
}
