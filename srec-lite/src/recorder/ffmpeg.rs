//! FFmpeg capture implementation.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use futures::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::traits::{CaptureInvoker, CaptureRequest, CaptureSession};
use crate::utils::filename::capture_path;
use crate::{Error, Result};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// FFmpeg invocation settings.
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// Path to the ffmpeg binary.
    pub binary_path: String,
    /// User agent sent when opening the playlist.
    pub user_agent: Option<String>,
    /// Container extension of the recording.
    pub output_extension: String,
    /// How long ffmpeg gets to finalize its output after `q` on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            user_agent: None,
            output_extension: "mp4".to_string(),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Captures a stream by remuxing it with ffmpeg (`-c:a copy -c:v copy`).
pub struct FfmpegCapture {
    config: FfmpegConfig,
    /// Fires on process shutdown; running ffmpeg processes are asked to stop.
    shutdown: CancellationToken,
}

impl FfmpegCapture {
    pub fn new(config: FfmpegConfig, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    /// First line of `ffmpeg -version`, if the binary can be run.
    pub fn detect_version(&self) -> Option<String> {
        std::process::Command::new(&self.config.binary_path)
            .arg("-version")
            .output()
            .ok()
            .and_then(|output| {
                String::from_utf8(output.stdout)
                    .ok()
                    .and_then(|s| s.lines().next().map(str::to_string))
            })
    }

    /// Build ffmpeg command arguments.
    fn build_args(&self, request: &CaptureRequest, output_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];

        if let Some(ref ua) = self.config.user_agent {
            args.extend(["-user_agent".to_string(), ua.clone()]);
        }

        args.extend(["-i".to_string(), request.locator.clone()]);

        // Remux only, no re-encoding
        args.extend([
            "-c:a".to_string(),
            "copy".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
        ]);

        args.push(output_path.to_string_lossy().to_string());
        args
    }
}

/// Ask ffmpeg to quit so it can write the trailer, then kill it if it lingers.
async fn stop_child(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    if let Some(mut stdin) = child.stdin.take() {
        // ffmpeg may already be gone; the wait below reports that.
        let _ = stdin.write_all(b"q").await;
        let _ = stdin.flush().await;
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!("ffmpeg did not exit within {:?}, killing it", grace);
            child.kill().await?;
            child.wait().await
        }
    }
}

#[async_trait]
impl CaptureInvoker for FfmpegCapture {
    async fn launch(&self, request: CaptureRequest) -> Result<CaptureSession> {
        let output_path = capture_path(
            &request.output_dir,
            &request.source,
            Local::now(),
            &self.config.output_extension,
        );
        let args = self.build_args(&request, &output_path);

        debug!(source = %request.source, ?args, "Spawning ffmpeg");

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::dispatch(&request.source, format!("failed to spawn ffmpeg: {e}")))?;

        info!(
            source = %request.source,
            file = %output_path.display(),
            "Recording starting via ffmpeg"
        );

        if let Some(stderr) = child.stderr.take() {
            let source = request.source.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => debug!(source = %source, "ffmpeg: {}", line),
                        Ok(None) => break,
                        Err(e) => {
                            debug!(source = %source, error = %e, "Stopped reading ffmpeg output");
                            break;
                        }
                    }
                }
            });
        }

        let shutdown = self.shutdown.clone();
        let grace = self.config.shutdown_grace;
        let source = request.source;
        let completion = async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = shutdown.cancelled() => None,
            };
            let status = match exited {
                Some(status) => status,
                None => {
                    debug!(source = %source, "Stopping ffmpeg for shutdown");
                    stop_child(&mut child, grace).await
                }
            };

            match status {
                Ok(status) if !status.success() => {
                    warn!(source = %source, %status, "ffmpeg exited with failure status")
                }
                Ok(_) => {}
                Err(e) => error!(source = %source, error = %e, "Error waiting for ffmpeg"),
            }
        }
        .boxed();

        Ok(CaptureSession::new(output_path, completion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request() -> CaptureRequest {
        CaptureRequest::new(
            "http://cdn.example.com/alice/playlist.m3u8",
            "alice",
            "/rec",
        )
    }

    #[test]
    fn test_build_args_copies_streams() {
        let capture = FfmpegCapture::new(FfmpegConfig::default(), CancellationToken::new());
        let output = PathBuf::from("/rec/alice_2024-01-01_00-00-00.mp4");
        let args = capture.build_args(&request(), &output);

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "http://cdn.example.com/alice/playlist.m3u8");

        let joined = args.join(" ");
        assert!(joined.contains("-c:a copy -c:v copy"));
        assert_eq!(args.last().unwrap(), "/rec/alice_2024-01-01_00-00-00.mp4");
        assert!(!args.contains(&"-user_agent".to_string()));
    }

    #[test]
    fn test_build_args_user_agent_precedes_input() {
        let config = FfmpegConfig {
            user_agent: Some("Mozilla/5.0".to_string()),
            ..Default::default()
        };
        let capture = FfmpegCapture::new(config, CancellationToken::new());
        let args = capture.build_args(&request(), Path::new("/rec/out.mp4"));

        let ua = args.iter().position(|a| a == "-user_agent").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[ua + 1], "Mozilla/5.0");
        assert!(ua < input);
    }

    #[tokio::test]
    async fn test_missing_binary_is_dispatch_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = FfmpegConfig {
            binary_path: tmp
                .path()
                .join("no-such-ffmpeg")
                .to_string_lossy()
                .to_string(),
            ..Default::default()
        };
        let capture = FfmpegCapture::new(config, CancellationToken::new());

        let req = CaptureRequest::new("http://x/playlist.m3u8", "alice", tmp.path());
        let err = capture.launch(req).await.unwrap_err();
        assert!(matches!(err, Error::Dispatch { ref source_id, .. } if source_id == "alice"));
        assert!(capture.detect_version().is_none());
    }

    /// Write an executable stand-in for ffmpeg.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    /// Launch through `capture`, retrying while the fresh script is still busy.
    #[cfg(unix)]
    async fn launch_fake(capture: &FfmpegCapture, output_dir: &Path) -> CaptureSession {
        let mut attempts = 0;
        loop {
            let req = CaptureRequest::new("http://x/playlist.m3u8", "alice", output_dir);
            match capture.launch(req).await {
                Ok(session) => return session,
                Err(e) if attempts < 10 => {
                    attempts += 1;
                    debug!(error = %e, "Retrying fake ffmpeg launch");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Err(e) => panic!("fake ffmpeg did not start: {e}"),
            }
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_sends_quit_to_ffmpeg() {
        let tmp = tempfile::tempdir().unwrap();
        let config = FfmpegConfig {
            binary_path: fake_ffmpeg(tmp.path(), "read -r _\nexit 0"),
            shutdown_grace: Duration::from_secs(10),
            ..Default::default()
        };
        let token = CancellationToken::new();
        let capture = FfmpegCapture::new(config, token.clone());

        let (_, completion) = launch_fake(&capture, tmp.path()).await.into_parts();
        let completion = tokio::spawn(completion);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!completion.is_finished());

        let started = std::time::Instant::now();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), completion)
            .await
            .expect("ffmpeg did not quit")
            .unwrap();

        // Well inside the 10s grace, so ffmpeg left on its own.
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_kills_ffmpeg_after_grace() {
        let tmp = tempfile::tempdir().unwrap();
        let grace = Duration::from_millis(300);
        let config = FfmpegConfig {
            binary_path: fake_ffmpeg(tmp.path(), "exec sleep 100"),
            shutdown_grace: grace,
            ..Default::default()
        };
        let token = CancellationToken::new();
        let capture = FfmpegCapture::new(config, token.clone());

        let (_, completion) = launch_fake(&capture, tmp.path()).await.into_parts();
        let completion = tokio::spawn(completion);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), completion)
            .await
            .expect("ffmpeg was not killed")
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= grace, "killed before grace: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(5));
    }
}
