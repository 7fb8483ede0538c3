//! ML client error types.

use crtscan_media::MediaError;
use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("ML service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Image encoding failed: {0}")]
    Encoding(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MlError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MlError::ServiceUnavailable(_) | MlError::Timeout(_) | MlError::Network(_)
        )
    }

    /// Report this failure as a failure of the named oracle.
    pub fn into_oracle_error(self, oracle: &str) -> MediaError {
        MediaError::oracle_failed(oracle, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(MlError::ServiceUnavailable("503".into()).is_retryable());
        assert!(MlError::Timeout(30).is_retryable());
        assert!(!MlError::InvalidResponse("bad".into()).is_retryable());
        assert!(!MlError::RequestFailed("400".into()).is_retryable());
    }

    #[test]
    fn test_oracle_error_conversion() {
        let err = MlError::InvalidResponse("truncated".into()).into_oracle_error("http_detector");
        assert!(err.is_oracle_failure());
        assert!(err.to_string().contains("http_detector"));
    }
}
