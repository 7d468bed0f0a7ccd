//! Configuration for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How the ffmpeg process is launched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Directory the process runs in.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Kill the process after this many seconds. `0` disables the timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Global arguments placed before the input.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_working_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_timeout() -> u64 {
    3600 // 1 hour
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            working_dir: default_working_dir(),
            timeout_secs: default_timeout(),
            extra_args: Vec::new(),
        }
    }
}

impl TranscoderConfig {
    /// Creates a config using the given ffmpeg binary.
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Sets the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Sets the timeout. `0` disables it.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Appends global arguments.
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Timeout as a duration, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TranscoderConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.working_dir, std::env::temp_dir());
        assert_eq!(config.timeout_secs, 3600);
        assert_eq!(config.timeout(), Some(Duration::from_secs(3600)));
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_builder_methods() {
        let config = TranscoderConfig::default()
            .with_ffmpeg_path("/opt/ffmpeg/bin/ffmpeg")
            .with_working_dir("/var/tmp")
            .with_timeout(0)
            .with_extra_args(["-hide_banner", "-nostdin"]);

        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.working_dir, PathBuf::from("/var/tmp"));
        assert_eq!(config.timeout(), None);
        assert_eq!(config.extra_args, vec!["-hide_banner", "-nostdin"]);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: TranscoderConfig = toml::from_str("timeout_secs = 30").unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
    }
}
