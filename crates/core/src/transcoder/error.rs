//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running a transcode.
#[derive(Debug, Error)]
pub enum TranscoderError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// Working directory does not exist and could not be created.
    #[error("Failed to prepare working directory: {path}")]
    WorkingDirectoryFailed { path: PathBuf },

    /// The process exited with a non-zero status.
    #[error("FFmpeg error: {}", .last_line.as_deref().unwrap_or("exited without diagnostic output"))]
    ProcessFailed {
        code: Option<i32>,
        last_line: Option<String>,
    },

    /// The process ran longer than the configured timeout and was killed.
    #[error("Transcode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The transcode was cancelled through its handle.
    #[error("Transcode cancelled")]
    Cancelled,

    /// The task driving the process ended abnormally.
    #[error("Transcode task aborted: {reason}")]
    Aborted { reason: String },

    /// I/O error while talking to the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscoderError {
    /// Creates a new process failed error.
    pub fn process_failed(code: Option<i32>, last_line: Option<String>) -> Self {
        Self::ProcessFailed { code, last_line }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_failed_message_uses_last_line() {
        let err = TranscoderError::process_failed(
            Some(1),
            Some("in.mp4: No such file or directory".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "FFmpeg error: in.mp4: No such file or directory"
        );
    }

    #[test]
    fn test_process_failed_without_output() {
        let err = TranscoderError::process_failed(None, None);
        assert_eq!(err.to_string(), "FFmpeg error: exited without diagnostic output");
    }
}
