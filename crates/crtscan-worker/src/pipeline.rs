//! Job pipeline.
//!
//! Three workers connected by bounded queues:
//! - the inference worker takes jobs from the submission queue one at a time
//!   and runs each video through the inspector;
//! - the persistence worker hands finished job reports to the report writer;
//! - the progress relay forwards per-job progress to the observer.
//!
//! Graceful shutdown enqueues a `Finished` sentinel behind the submitted jobs.
//! The inference worker forwards it to the persistence worker before exiting,
//! and the progress relay stops once the inference worker has dropped its end
//! of the progress channel. A hard abort kills the inference worker and
//! discards the in-flight job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crtscan_media::{
    BatchSizes, InspectionProfile, JobProgress, MediaError, OracleRegistry, ProgressSender, SectionVerdict,
    SourceOpener, VideoInspector,
};
use crtscan_models::{InspectionJob, JobId, JobState};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{debug, error, info, warn, Instrument};
use validator::Validate;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::observer::ProgressObserver;
use crate::report::{JobReport, ReportReceipt, ReportWriter};

/// Collaborators the pipeline is wired with.
#[derive(Clone)]
pub struct PipelineDeps {
    pub opener: Arc<dyn SourceOpener>,
    pub oracles: OracleRegistry,
    pub writer: Arc<dyn ReportWriter>,
    pub observer: Arc<dyn ProgressObserver>,
    pub batch: BatchSizes,
}

/// Notable things that happened to a job, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    JobStarted { job_id: JobId },
    JobFailed { job_id: JobId, error: String },
    JobAborted { job_id: JobId },
    Persisted { job_id: JobId, sections: usize, location: String },
    PersistFailed { job_id: JobId, error: String },
}

impl PipelineEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            PipelineEvent::JobStarted { job_id }
            | PipelineEvent::JobFailed { job_id, .. }
            | PipelineEvent::JobAborted { job_id }
            | PipelineEvent::Persisted { job_id, .. }
            | PipelineEvent::PersistFailed { job_id, .. } => job_id,
        }
    }

    /// Job state the event moves its job into.
    pub fn state(&self) -> JobState {
        match self {
            PipelineEvent::JobStarted { .. } => JobState::Inspecting,
            PipelineEvent::Persisted { .. } => JobState::Persisted,
            PipelineEvent::JobFailed { .. } | PipelineEvent::PersistFailed { .. } => JobState::Failed,
            PipelineEvent::JobAborted { .. } => JobState::Aborted,
        }
    }
}

enum Submission {
    Job(InspectionJob),
    Finished,
}

enum PersistCommand {
    Store(JobReport),
    Retry {
        job_id: JobId,
        reply: oneshot::Sender<WorkerResult<ReportReceipt>>,
    },
    Finished,
}

/// Running pipeline. Dropping it without `shutdown` or `abort` leaves the
/// workers running until their queues close.
pub struct JobPipeline {
    submit_tx: mpsc::Sender<Submission>,
    persist_tx: mpsc::Sender<PersistCommand>,
    events_tx: mpsc::Sender<PipelineEvent>,
    events_rx: Option<mpsc::Receiver<PipelineEvent>>,
    current_job: watch::Receiver<Option<JobId>>,
    inference: JoinHandle<()>,
    persistence: JoinHandle<()>,
    relay: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl JobPipeline {
    /// Spawn the three workers. Must be called inside a tokio runtime.
    pub fn start(config: &WorkerConfig, deps: PipelineDeps) -> Self {
        let (submit_tx, submit_rx) = mpsc::channel(config.submit_capacity);
        let (persist_tx, persist_rx) = mpsc::channel(config.result_capacity);
        let (progress_tx, progress_rx) = mpsc::channel(config.progress_capacity);
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity);
        let (current_tx, current_job) = watch::channel(None);

        let inference = InferenceWorker {
            opener: deps.opener,
            oracles: deps.oracles,
            batch: deps.batch,
            persist_tx: persist_tx.clone(),
            progress_tx,
            events: events_tx.clone(),
            current: current_tx,
        };
        let inference = tokio::spawn(inference.run(submit_rx));
        let persistence = tokio::spawn(run_persistence(persist_rx, deps.writer, events_tx.clone()));
        let relay = tokio::spawn(run_progress_relay(progress_rx, deps.observer));

        info!("Job pipeline started");

        Self {
            submit_tx,
            persist_tx,
            events_tx,
            events_rx: Some(events_rx),
            current_job,
            inference,
            persistence,
            relay,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Queue a job for inspection. Waits while the submission queue is full.
    pub async fn submit(&self, job: InspectionJob) -> WorkerResult<JobId> {
        job.validate()
            .map_err(|e| WorkerError::invalid_job(format!("{}: {}", job.id, e)))?;

        let job_id = job.id.clone();
        self.submit_tx
            .send(Submission::Job(job))
            .await
            .map_err(|_| WorkerError::PipelineClosed)?;
        debug!(job_id = %job_id, "Job submitted");
        Ok(job_id)
    }

    /// Attempt once more to persist a report whose write failed. The report
    /// is dropped afterwards whatever the outcome.
    pub async fn retry_persist(&self, job_id: &JobId) -> WorkerResult<ReportReceipt> {
        let (reply, response) = oneshot::channel();
        self.persist_tx
            .send(PersistCommand::Retry {
                job_id: job_id.clone(),
                reply,
            })
            .await
            .map_err(|_| WorkerError::PipelineClosed)?;
        response.await.map_err(|_| WorkerError::PipelineClosed)?
    }

    /// Event stream of the pipeline. Can be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<PipelineEvent>> {
        self.events_rx.take()
    }

    /// Job currently being inspected, if any.
    pub fn current_job(&self) -> Option<JobId> {
        self.current_job.borrow().clone()
    }

    /// Handle that hard-aborts the inference worker from another task. A
    /// pending `shutdown` then completes as if `abort` had been called.
    pub fn abort_handle(&self) -> AbortHandle {
        self.inference.abort_handle()
    }

    /// Drain every submitted job, then stop all workers.
    pub async fn shutdown(mut self) -> WorkerResult<()> {
        info!("Job pipeline draining");
        // Fails only when the inference worker is already gone.
        let _ = self.submit_tx.send(Submission::Finished).await;
        let inference = (&mut self.inference).await;
        self.stop(inference).await
    }

    /// Stop the inference worker immediately. The in-flight job is discarded
    /// and queued jobs are dropped; reports already handed to persistence are
    /// still written.
    pub async fn abort(mut self) -> WorkerResult<()> {
        warn!("Job pipeline hard abort");
        self.inference.abort();
        let inference = (&mut self.inference).await;
        self.stop(inference).await
    }

    async fn stop(mut self, inference: Result<(), JoinError>) -> WorkerResult<()> {
        match inference {
            Err(e) if e.is_cancelled() => {
                if let Some(job_id) = self.current_job() {
                    metrics::record_job_aborted();
                    warn!(job_id = %job_id, "In-flight job discarded");
                    emit(&self.events_tx, PipelineEvent::JobAborted { job_id });
                }
            }
            other => log_join("inference", other),
        }

        let _ = self.persist_tx.send(PersistCommand::Finished).await;
        let stopped = tokio::time::timeout(self.shutdown_timeout, async {
            log_join("persistence", (&mut self.persistence).await);
            log_join("progress relay", (&mut self.relay).await);
        })
        .await;

        if stopped.is_err() {
            self.persistence.abort();
            self.relay.abort();
            return Err(WorkerError::ShutdownTimeout(self.shutdown_timeout.as_secs()));
        }

        info!("Job pipeline stopped");
        Ok(())
    }
}

fn log_join(worker: &str, result: Result<(), JoinError>) {
    if let Err(e) = result {
        if !e.is_cancelled() {
            error!(worker, error = %e, "Pipeline worker panicked");
        }
    }
}

fn emit(events: &mpsc::Sender<PipelineEvent>, event: PipelineEvent) {
    if events.try_send(event).is_err() {
        warn!("Pipeline event dropped, no listener or queue full");
    }
}

struct InferenceWorker {
    opener: Arc<dyn SourceOpener>,
    oracles: OracleRegistry,
    batch: BatchSizes,
    persist_tx: mpsc::Sender<PersistCommand>,
    progress_tx: mpsc::Sender<JobProgress>,
    events: mpsc::Sender<PipelineEvent>,
    current: watch::Sender<Option<JobId>>,
}

impl InferenceWorker {
    async fn run(self, mut submissions: mpsc::Receiver<Submission>) {
        while let Some(Submission::Job(job)) = submissions.recv().await {
            let logger = JobLogger::new(&job.id, "inspection");
            let span = logger.create_span();
            let report = self.process(job, &logger).instrument(span).await;

            if let Some(report) = report {
                if self.persist_tx.send(PersistCommand::Store(report)).await.is_err() {
                    error!("Persistence worker stopped, report lost");
                }
            }
        }

        debug!("Inference worker finished");
        let _ = self.persist_tx.send(PersistCommand::Finished).await;
    }

    async fn process(&self, job: InspectionJob, logger: &JobLogger) -> Option<JobReport> {
        let _ = self.current.send(Some(job.id.clone()));
        emit(&self.events, PipelineEvent::JobStarted { job_id: job.id.clone() });
        logger.log_start(&job);

        let started = Instant::now();
        let progress = ProgressSender::new(self.progress_tx.clone(), job.id.clone());
        let result = self.inspect(&job, &progress).await;
        let _ = self.current.send(None);

        match result {
            Ok(verdicts) => {
                let elapsed = started.elapsed().as_secs_f64();
                metrics::record_job_completed(job.video_type.as_str(), elapsed);
                if verdicts.is_empty() {
                    logger.log_warning("no sections detected");
                }
                logger.log_completion(verdicts.len(), elapsed);
                Some(JobReport::new(job, verdicts))
            }
            Err(e) => {
                metrics::record_job_failed(job.video_type.as_str());
                logger.log_error(&e.to_string());
                emit(
                    &self.events,
                    PipelineEvent::JobFailed {
                        job_id: job.id.clone(),
                        error: e.to_string(),
                    },
                );
                None
            }
        }
    }

    async fn inspect(&self, job: &InspectionJob, progress: &ProgressSender) -> Result<Vec<SectionVerdict>, MediaError> {
        let setup = async {
            let profile = InspectionProfile::for_video_type(job.video_type).with_batch_sizes(self.batch);
            let inspector = VideoInspector::new(profile, self.oracles.get(job.video_type)?)?;
            let source = self.opener.open(&job.video_source).await?;
            Ok::<_, MediaError>((inspector, source))
        };

        match setup.await {
            Ok((inspector, source)) => inspector.inspect(source, progress).await,
            Err(e) => {
                progress.finished().await;
                Err(e)
            }
        }
    }
}

async fn run_persistence(
    mut commands: mpsc::Receiver<PersistCommand>,
    writer: Arc<dyn ReportWriter>,
    events: mpsc::Sender<PipelineEvent>,
) {
    let mut retained: HashMap<JobId, JobReport> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            PersistCommand::Store(report) => {
                if persist(writer.as_ref(), &report, &events).await.is_err() {
                    retained.insert(report.job_id().clone(), report);
                }
            }
            PersistCommand::Retry { job_id, reply } => {
                let result = match retained.remove(&job_id) {
                    Some(report) => persist(writer.as_ref(), &report, &events).await,
                    None => Err(WorkerError::NothingToRetry(job_id)),
                };
                let _ = reply.send(result);
            }
            PersistCommand::Finished => break,
        }
    }

    if !retained.is_empty() {
        warn!(reports = retained.len(), "Dropping reports that were never persisted");
    }
    debug!("Persistence worker finished");
}

async fn persist(
    writer: &dyn ReportWriter,
    report: &JobReport,
    events: &mpsc::Sender<PipelineEvent>,
) -> WorkerResult<ReportReceipt> {
    let job_id = report.job_id().clone();
    match writer.write(report).await {
        Ok(receipt) => {
            metrics::record_report_persisted(writer.name());
            info!(job_id = %job_id, location = %receipt.location, "Report persisted");
            emit(
                events,
                PipelineEvent::Persisted {
                    job_id,
                    sections: report.verdicts.len(),
                    location: receipt.location.clone(),
                },
            );
            Ok(receipt)
        }
        Err(e) => {
            metrics::record_report_failure(writer.name());
            error!(job_id = %job_id, error = %e, "Report persistence failed");
            emit(
                events,
                PipelineEvent::PersistFailed {
                    job_id,
                    error: e.to_string(),
                },
            );
            Err(e)
        }
    }
}

async fn run_progress_relay(mut progress: mpsc::Receiver<JobProgress>, observer: Arc<dyn ProgressObserver>) {
    while let Some(JobProgress { job_id, update }) = progress.recv().await {
        observer.on_progress(&job_id, update).await;
    }
    debug!("Progress relay finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crtscan_media::test_support::{registry_with, ScriptedDetector, SyntheticOpener, SyntheticSource};
    use crtscan_media::{FrameSource, MediaResult};
    use crtscan_models::{ProgressUpdate, VideoType};
    use image::RgbImage;
    use std::path::Path;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// Records the job IDs it was asked to write, failing the first
    /// `failures` writes.
    #[derive(Default)]
    struct RecordingWriter {
        written: Mutex<Vec<JobId>>,
        failures: Mutex<usize>,
    }

    impl RecordingWriter {
        fn failing(failures: usize) -> Self {
            Self {
                failures: Mutex::new(failures),
                ..Self::default()
            }
        }

        fn written(&self) -> Vec<JobId> {
            self.written.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReportWriter for RecordingWriter {
        async fn write(&self, report: &JobReport) -> WorkerResult<ReportReceipt> {
            {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(WorkerError::report_failed("disk full"));
                }
            }
            self.written.lock().unwrap().push(report.job_id().clone());
            Ok(ReportReceipt {
                location: format!("memory://{}", report.job_id()),
            })
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[derive(Default)]
    struct CollectingObserver {
        updates: Mutex<Vec<(JobId, ProgressUpdate)>>,
    }

    impl CollectingObserver {
        fn finished_jobs(&self) -> Vec<JobId> {
            self.updates
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, u)| u.is_finished())
                .map(|(id, _)| id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ProgressObserver for CollectingObserver {
        async fn on_progress(&self, job_id: &JobId, update: ProgressUpdate) {
            self.updates.lock().unwrap().push((job_id.clone(), update));
        }
    }

    /// Source whose first read never completes.
    struct StalledSource;

    #[async_trait]
    impl FrameSource for StalledSource {
        async fn read_frame(&mut self) -> MediaResult<Option<RgbImage>> {
            std::future::pending().await
        }

        fn position_ms(&self) -> f64 {
            0.0
        }

        fn frame_count(&self) -> u64 {
            1_000
        }

        fn reported_fps(&self) -> f64 {
            30.0
        }
    }

    struct StalledOpener;

    #[async_trait]
    impl SourceOpener for StalledOpener {
        async fn open(&self, _path: &Path) -> MediaResult<Box<dyn FrameSource>> {
            Ok(Box::new(StalledSource))
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    struct Harness {
        pipeline: JobPipeline,
        events: mpsc::Receiver<PipelineEvent>,
        writer: Arc<RecordingWriter>,
        observer: Arc<CollectingObserver>,
    }

    fn harness(opener: Arc<dyn SourceOpener>, detector: ScriptedDetector, writer: RecordingWriter) -> Harness {
        let writer = Arc::new(writer);
        let observer = Arc::new(CollectingObserver::default());
        let deps = PipelineDeps {
            opener,
            oracles: registry_with(Arc::new(detector)),
            writer: writer.clone(),
            observer: observer.clone(),
            batch: BatchSizes::default(),
        };
        let mut pipeline = JobPipeline::start(&WorkerConfig::default(), deps);
        let events = pipeline.take_events().unwrap();
        Harness {
            pipeline,
            events,
            writer,
            observer,
        }
    }

    fn synthetic_opener() -> Arc<dyn SourceOpener> {
        Arc::new(SyntheticOpener {
            template: SyntheticSource::new(300, 30.0),
        })
    }

    /// Screen visible from 2 s to 8 s of a 10 s video.
    fn screen_detector() -> ScriptedDetector {
        ScriptedDetector::hits_in(60..=240)
    }

    fn job(name: &str) -> InspectionJob {
        InspectionJob::new(format!("/videos/{}.mp4", name), "/reports")
    }

    async fn drain_events(mut events: mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut collected = Vec::new();
        while let Some(event) = events.recv().await {
            collected.push(event);
        }
        collected
    }

    #[tokio::test]
    async fn test_two_jobs_persisted_in_order() {
        let h = harness(synthetic_opener(), screen_detector(), RecordingWriter::default());
        let first = h.pipeline.submit(job("first")).await.unwrap();
        let second = h.pipeline.submit(job("second")).await.unwrap();
        assert_ok!(h.pipeline.shutdown().await);

        assert_eq!(h.writer.written(), vec![first.clone(), second.clone()]);

        let events = drain_events(h.events).await;
        assert!(events
            .iter()
            .filter(|e| e.job_id() == &first)
            .map(PipelineEvent::state)
            .eq([JobState::Inspecting, JobState::Persisted]));

        let persisted: Vec<(JobId, usize)> = events
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::Persisted { job_id, sections, .. } => Some((job_id, sections)),
                _ => None,
            })
            .collect();
        assert_eq!(persisted, vec![(first.clone(), 1), (second.clone(), 1)]);
        assert_eq!(h.observer.finished_jobs(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_fog_job_uses_fog_oracles() {
        let h = harness(synthetic_opener(), screen_detector(), RecordingWriter::default());
        let fog = h
            .pipeline
            .submit(job("fog").with_video_type(VideoType::Fog))
            .await
            .unwrap();
        assert_ok!(h.pipeline.shutdown().await);

        assert_eq!(h.writer.written(), vec![fog.clone()]);
        let events = drain_events(h.events).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::Persisted { job_id, sections: 1, .. } if *job_id == fog)));
    }

    #[tokio::test]
    async fn test_zero_jobs_clean_shutdown() {
        let h = harness(synthetic_opener(), screen_detector(), RecordingWriter::default());
        assert_ok!(h.pipeline.shutdown().await);

        assert!(h.writer.written().is_empty());
        assert!(drain_events(h.events).await.is_empty());
        assert!(h.observer.finished_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_oracle_failure_isolated_to_job() {
        // The fifth detector call falls inside the first job.
        let h = harness(
            synthetic_opener(),
            screen_detector().failing_on_call(4),
            RecordingWriter::default(),
        );
        let failing = h.pipeline.submit(job("failing")).await.unwrap();
        let healthy = h.pipeline.submit(job("healthy")).await.unwrap();
        assert_ok!(h.pipeline.shutdown().await);

        assert_eq!(h.writer.written(), vec![healthy.clone()]);
        let events = drain_events(h.events).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::JobFailed { job_id, .. } if *job_id == failing)));
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::Persisted { job_id, .. } if *job_id == healthy)));
        assert_eq!(h.observer.finished_jobs(), vec![failing, healthy]);
    }

    #[tokio::test]
    async fn test_unopenable_video_fails_job() {
        let h = harness(synthetic_opener(), screen_detector(), RecordingWriter::default());
        let missing = h.pipeline.submit(job("missing")).await.unwrap();
        assert_ok!(h.pipeline.shutdown().await);

        assert!(h.writer.written().is_empty());
        let events = drain_events(h.events).await;
        assert!(matches!(events.last(), Some(PipelineEvent::JobFailed { job_id, .. }) if *job_id == missing));
        assert_eq!(h.observer.finished_jobs(), vec![missing]);
    }

    #[tokio::test]
    async fn test_invalid_job_rejected() {
        let h = harness(synthetic_opener(), screen_detector(), RecordingWriter::default());
        let err = assert_err!(h.pipeline.submit(InspectionJob::new("", "/reports")).await);
        assert!(matches!(err, WorkerError::InvalidJob(_)));
        assert_ok!(h.pipeline.shutdown().await);
    }

    #[tokio::test]
    async fn test_failed_persist_retried_once() {
        let mut h = harness(synthetic_opener(), screen_detector(), RecordingWriter::failing(1));
        let job_id = h.pipeline.submit(job("flaky")).await.unwrap();

        loop {
            match h.events.recv().await {
                Some(PipelineEvent::PersistFailed { job_id: failed, .. }) => {
                    assert_eq!(failed, job_id);
                    break;
                }
                Some(_) => continue,
                None => panic!("event stream closed before persistence failed"),
            }
        }

        let receipt = assert_ok!(h.pipeline.retry_persist(&job_id).await);
        assert_eq!(receipt.location, format!("memory://{}", job_id));
        let again = assert_err!(h.pipeline.retry_persist(&job_id).await);
        assert!(matches!(again, WorkerError::NothingToRetry(_)));

        assert_ok!(h.pipeline.shutdown().await);
        assert_eq!(h.writer.written(), vec![job_id]);
    }

    #[tokio::test]
    async fn test_hard_abort_discards_in_flight_job() {
        let mut h = harness(Arc::new(StalledOpener), screen_detector(), RecordingWriter::default());
        let stuck = h.pipeline.submit(job("stuck")).await.unwrap();
        h.pipeline.submit(job("queued")).await.unwrap();

        match h.events.recv().await {
            Some(PipelineEvent::JobStarted { job_id }) => assert_eq!(job_id, stuck),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(h.pipeline.current_job(), Some(stuck.clone()));

        tokio::time::timeout(Duration::from_secs(5), h.pipeline.abort())
            .await
            .unwrap()
            .unwrap();

        assert!(h.writer.written().is_empty());
        let events = drain_events(h.events).await;
        assert_eq!(events, vec![PipelineEvent::JobAborted { job_id: stuck }]);
    }

    #[tokio::test]
    async fn test_abort_handle_interrupts_drain() {
        let mut h = harness(Arc::new(StalledOpener), screen_detector(), RecordingWriter::default());
        let stuck = h.pipeline.submit(job("stuck")).await.unwrap();
        assert!(matches!(h.events.recv().await, Some(PipelineEvent::JobStarted { .. })));

        let abort = h.pipeline.abort_handle();
        let drain = tokio::spawn(h.pipeline.shutdown());
        tokio::task::yield_now().await;
        abort.abort();

        tokio::time::timeout(Duration::from_secs(5), drain)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(drain_events(h.events).await, vec![PipelineEvent::JobAborted { job_id: stuck }]);
    }
}
