//! Application configuration.
//!
//! Settings come from an optional `config.toml` in the config directory.
//! Every field has a default, so an absent file is a valid configuration.
//! Command-line flags are applied on top by the binary.

pub mod dirs;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::monitor::SOURCE_PLACEHOLDER;
use crate::recorder::FfmpegConfig;
use crate::scheduler::PollConfig;
use crate::utils::http_client::HttpClientOptions;
use crate::{Error, Result};

/// Name of the optional config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// User agent the status probe and ffmpeg identify as.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/56.0.2924.87 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seconds to wait after a full pass before the next one.
    pub poll_interval_secs: u64,
    /// Seconds to wait before retrying an unreadable source list.
    pub source_retry_secs: u64,
    /// Status page URL; `{source}` is replaced by the source identifier.
    pub probe_url_template: String,
    pub user_agent: String,
    /// Per-probe timeout in seconds, 0 to disable.
    pub request_timeout_secs: u64,
    /// Optional proxy for status probes.
    pub proxy: Option<String>,
    /// Source list file, relative to the config directory unless absolute.
    pub sources_file: PathBuf,
    pub ffmpeg_path: String,
    pub output_extension: String,
    /// Seconds ffmpeg gets to finalize recordings on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 31,
            source_retry_secs: 10,
            probe_url_template: "https://en.chaturbate.com/{source}/".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
            proxy: None,
            sources_file: PathBuf::from("sources.txt"),
            ffmpeg_path: "ffmpeg".to_string(),
            output_extension: "mp4".to_string(),
            shutdown_grace_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load `config.toml` from `config_dir`, or defaults if it does not exist.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::io_path("reading config file", &path, e))?;
        let config = Self::from_toml(&contents).map_err(|source| Error::ConfigParse {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Reject settings the poll loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::config("poll_interval_secs must be greater than 0"));
        }
        if self.source_retry_secs == 0 {
            return Err(Error::config("source_retry_secs must be greater than 0"));
        }
        if !self.probe_url_template.contains(SOURCE_PLACEHOLDER) {
            return Err(Error::config(format!(
                "probe_url_template must contain {SOURCE_PLACEHOLDER}"
            )));
        }
        if self.output_extension.trim_start_matches('.').is_empty() {
            return Err(Error::config("output_extension must not be empty"));
        }
        if self.ffmpeg_path.is_empty() {
            return Err(Error::config("ffmpeg_path must not be empty"));
        }
        Ok(())
    }

    /// Absolute path of the source list.
    pub fn sources_path(&self, config_dir: &Path) -> PathBuf {
        if self.sources_file.is_absolute() {
            self.sources_file.clone()
        } else {
            config_dir.join(&self.sources_file)
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            source_retry_delay: Duration::from_secs(self.source_retry_secs),
        }
    }

    pub fn http_options(&self) -> HttpClientOptions {
        HttpClientOptions {
            user_agent: Some(self.user_agent.clone()),
            timeout: Duration::from_secs(self.request_timeout_secs),
            proxy: self.proxy.clone(),
        }
    }

    pub fn ffmpeg_config(&self) -> FfmpegConfig {
        FfmpegConfig {
            binary_path: self.ffmpeg_path.clone(),
            user_agent: Some(self.user_agent.clone()),
            output_extension: self.output_extension.clone(),
            shutdown_grace: self.shutdown_grace(),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
