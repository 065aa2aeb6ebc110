use std::path::PathBuf;

use clap::Parser;

use srec_lite::config::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory recordings are written to (must already exist)
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Config directory holding config.toml and the source list
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Seconds to wait between polling passes
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Path to the ffmpeg binary
    #[arg(long, value_name = "PATH")]
    pub ffmpeg: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(interval) = self.interval {
            config.poll_interval_secs = interval;
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            config.ffmpeg_path = ffmpeg.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_output_dir() {
        let args = Args::try_parse_from(["srec-lite", "/srv/rec"]).unwrap();
        assert_eq!(args.output_dir, PathBuf::from("/srv/rec"));
        assert!(args.config_dir.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_missing_output_dir_is_usage_error() {
        assert!(Args::try_parse_from(["srec-lite"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let args =
            Args::try_parse_from(["srec-lite", "out", "--interval", "5", "--ffmpeg", "/opt/ffmpeg"])
                .unwrap();
        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.ffmpeg_path, "/opt/ffmpeg");
        assert_eq!(config.source_retry_secs, 10);
    }
}
