//! Structured job logging utilities.

use crtscan_models::{InspectionJob, JobId};
use tracing::{error, info, warn, Span};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a job, with the video it inspects.
    pub fn log_start(&self, job: &InspectionJob) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            video = %job.video_source.display(),
            video_type = %job.video_type,
            "Job started"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    /// Log the completion of a job with its section count.
    pub fn log_completion(&self, sections: usize, elapsed_secs: f64) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            sections,
            elapsed_secs,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
