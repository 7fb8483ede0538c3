//! Worker error types.

use crtscan_models::JobId;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Report failed: {0}")]
    ReportFailed(String),

    #[error("No retained report for job {0}")]
    NothingToRetry(JobId),

    #[error("Pipeline is closed")]
    PipelineClosed,

    #[error("Shutdown did not complete within {0} seconds")]
    ShutdownTimeout(u64),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] crtscan_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    pub fn report_failed(msg: impl Into<String>) -> Self {
        Self::ReportFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if the error came from an inspection oracle.
    pub fn is_oracle_failure(&self) -> bool {
        matches!(self, WorkerError::Media(e) if e.is_oracle_failure())
    }

    /// Check if a report write may succeed when attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkerError::ReportFailed(_) | WorkerError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crtscan_media::MediaError;

    #[test]
    fn test_oracle_failure_detection() {
        let err: WorkerError = MediaError::oracle_failed("detector", "down").into();
        assert!(err.is_oracle_failure());
        assert!(!WorkerError::PipelineClosed.is_oracle_failure());
    }

    #[test]
    fn test_retryable() {
        assert!(WorkerError::report_failed("disk full").is_retryable());
        assert!(!WorkerError::invalid_job("empty path").is_retryable());
    }
}
