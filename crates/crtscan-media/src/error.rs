//! Error types for inspection operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for inspection operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while inspecting a video.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Frame source failed: {0}")]
    SourceFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("{oracle} oracle failed: {message}")]
    OracleFailed { oracle: String, message: String },

    #[error("{oracle} oracle returned {got} results for {expected} inputs")]
    OracleCardinality {
        oracle: String,
        expected: usize,
        got: usize,
    },

    #[error("Invalid inspection profile: {0}")]
    InvalidProfile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an oracle failure error.
    pub fn oracle_failed(oracle: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OracleFailed {
            oracle: oracle.into(),
            message: message.into(),
        }
    }

    /// Create an oracle cardinality mismatch error.
    pub fn oracle_cardinality(oracle: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::OracleCardinality {
            oracle: oracle.into(),
            expected,
            got,
        }
    }

    /// Create a frame source failure error.
    pub fn source_failed(message: impl Into<String>) -> Self {
        Self::SourceFailed(message.into())
    }

    /// Create an invalid profile error.
    pub fn invalid_profile(message: impl Into<String>) -> Self {
        Self::InvalidProfile(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error came from an external oracle.
    pub fn is_oracle_failure(&self) -> bool {
        matches!(self, Self::OracleFailed { .. } | Self::OracleCardinality { .. })
    }
}
