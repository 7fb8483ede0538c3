//! Progress observers.

use async_trait::async_trait;
use crtscan_models::{JobId, ProgressUpdate};
use tracing::info;

/// Receives per-job progress relayed by the pipeline.
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn on_progress(&self, job_id: &JobId, update: ProgressUpdate);
}

/// Logs a progress line every `stride` samples and at the end of each video.
#[derive(Debug, Clone)]
pub struct LogProgressObserver {
    stride: u64,
}

impl LogProgressObserver {
    pub fn new(stride: u64) -> Self {
        Self { stride: stride.max(1) }
    }

    fn should_log(&self, update: &ProgressUpdate) -> bool {
        match *update {
            ProgressUpdate::Progress { processed, total } => processed % self.stride == 0 || processed == total,
            ProgressUpdate::Finished => true,
        }
    }
}

#[async_trait]
impl ProgressObserver for LogProgressObserver {
    async fn on_progress(&self, job_id: &JobId, update: ProgressUpdate) {
        if !self.should_log(&update) {
            return;
        }
        let (processed, total) = update.to_pair();
        info!(
            job_id = %job_id,
            processed,
            total,
            percent = update.percentage(),
            "Inspection progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_stride() {
        let observer = LogProgressObserver::new(10);
        assert!(observer.should_log(&ProgressUpdate::progress(10, 95)));
        assert!(!observer.should_log(&ProgressUpdate::progress(11, 95)));
        assert!(observer.should_log(&ProgressUpdate::progress(95, 95)));
        assert!(observer.should_log(&ProgressUpdate::Finished));
    }
}
