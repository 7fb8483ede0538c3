//! Progress reporting for inspections.
//!
//! Inspection code emits [`ProgressUpdate`]s without knowing where they go.
//! The worker relays them to whatever observer it was given.

use crtscan_models::{JobId, ProgressUpdate};
use tokio::sync::mpsc;

/// Progress update tagged with the job it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct JobProgress {
    pub job_id: JobId,
    pub update: ProgressUpdate,
}

/// Progress sender for one job.
///
/// Uses a bounded channel so the frame loop never waits on a slow observer.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<JobProgress>,
    job_id: JobId,
}

impl ProgressSender {
    pub fn new(tx: mpsc::Sender<JobProgress>, job_id: JobId) -> Self {
        Self { tx, job_id }
    }

    /// Sender whose updates go nowhere.
    pub fn disabled() -> Self {
        let (tx, _) = mpsc::channel(1);
        Self::new(tx, JobId::from_string("disabled"))
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Report `processed` of `total` samples (non-blocking).
    ///
    /// Dropped when the channel is full; a later update supersedes it.
    pub fn progress(&self, processed: u64, total: u64) {
        let _ = self.tx.try_send(JobProgress {
            job_id: self.job_id.clone(),
            update: ProgressUpdate::progress(processed, total),
        });
    }

    /// Report the end of the frame loop. Waits for channel capacity so the
    /// sentinel is never dropped.
    pub async fn finished(&self) {
        let _ = self
            .tx
            .send(JobProgress {
                job_id: self.job_id.clone(),
                update: ProgressUpdate::Finished,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_then_finished() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = ProgressSender::new(tx, JobId::from_string("job-1"));

        sender.progress(1, 10);
        sender.progress(2, 10);
        sender.finished().await;
        drop(sender);

        let mut updates = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.job_id.as_str(), "job-1");
            updates.push(event.update);
        }
        assert_eq!(
            updates,
            vec![
                ProgressUpdate::progress(1, 10),
                ProgressUpdate::progress(2, 10),
                ProgressUpdate::Finished
            ]
        );
    }

    #[tokio::test]
    async fn test_full_channel_drops_progress_only() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = ProgressSender::new(tx, JobId::from_string("job-2"));

        sender.progress(1, 10);
        sender.progress(2, 10);
        assert_eq!(rx.recv().await.map(|e| e.update), Some(ProgressUpdate::progress(1, 10)));

        sender.finished().await;
        assert_eq!(rx.recv().await.map(|e| e.update), Some(ProgressUpdate::Finished));
    }

    #[tokio::test]
    async fn test_disabled_sender_is_silent() {
        let sender = ProgressSender::disabled();
        sender.progress(1, 1);
        sender.finished().await;
    }
}
