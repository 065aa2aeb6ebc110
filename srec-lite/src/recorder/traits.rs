//! Capture invoker trait and related types.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::Result;

/// What to capture and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Playlist locator reported by the liveness check.
    pub locator: String,
    /// Source being captured.
    pub source: String,
    /// Existing directory receiving the recording.
    pub output_dir: PathBuf,
}

impl CaptureRequest {
    pub fn new(
        locator: impl Into<String>,
        source: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            locator: locator.into(),
            source: source.into(),
            output_dir: output_dir.into(),
        }
    }
}

/// A launched capture.
///
/// `completion` resolves once the external process has exited, whatever
/// its exit status.
pub struct CaptureSession {
    pub output_path: PathBuf,
    completion: BoxFuture<'static, ()>,
}

impl CaptureSession {
    pub fn new(output_path: impl Into<PathBuf>, completion: BoxFuture<'static, ()>) -> Self {
        Self {
            output_path: output_path.into(),
            completion,
        }
    }

    /// Split into the output path and the completion future.
    pub fn into_parts(self) -> (PathBuf, BoxFuture<'static, ()>) {
        (self.output_path, self.completion)
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("output_path", &self.output_path)
            .finish_non_exhaustive()
    }
}

/// Starts external capture processes.
#[async_trait]
pub trait CaptureInvoker: Send + Sync + 'static {
    /// Start capturing `request`.
    ///
    /// Returns as soon as the process is running. An error means nothing was
    /// started.
    async fn launch(&self, request: CaptureRequest) -> Result<CaptureSession>;
}
