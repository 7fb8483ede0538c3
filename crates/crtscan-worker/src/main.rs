//! Inspection worker binary.
//!
//! Usage: `crtscan-worker <jobs.json>` where the file holds an array of
//! inspection jobs. Ctrl-C hard-aborts the job being inspected.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crtscan_media::{BatchSizes, FfmpegOpener};
use crtscan_ml_client::{http_registry, MlClient};
use crtscan_models::InspectionJob;
use crtscan_worker::metrics::init_metrics;
use crtscan_worker::{JobPipeline, JsonReportWriter, LogProgressObserver, PipelineDeps, PipelineEvent, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    let jobs_path: PathBuf = match std::env::args_os().nth(1) {
        Some(path) => path.into(),
        None => bail!("usage: crtscan-worker <jobs.json>"),
    };

    info!("Starting crtscan-worker");

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: SocketAddr = addr.parse().with_context(|| format!("invalid METRICS_ADDR {}", addr))?;
        init_metrics(addr)?;
        info!(%addr, "Metrics exporter listening");
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let raw = tokio::fs::read(&jobs_path)
        .await
        .with_context(|| format!("reading {}", jobs_path.display()))?;
    let jobs: Vec<InspectionJob> =
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", jobs_path.display()))?;

    let client = Arc::new(MlClient::from_env().context("creating model service client")?);
    match client.health_check().await {
        Ok(true) => info!(url = %client.config().base_url, "Model service healthy"),
        Ok(false) => warn!(url = %client.config().base_url, "Model service reports unhealthy"),
        Err(e) => warn!("Model service health check failed: {}", e),
    }

    let deps = PipelineDeps {
        opener: Arc::new(FfmpegOpener),
        oracles: http_registry(client),
        writer: Arc::new(JsonReportWriter::new()),
        observer: Arc::new(LogProgressObserver::new(config.progress_stride)),
        batch: BatchSizes::from_env(),
    };

    let mut pipeline = JobPipeline::start(&config, deps);
    let events = pipeline.take_events().context("pipeline events already taken")?;
    let reporter = tokio::spawn(report_events(events));

    let abort = pipeline.abort_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, aborting current job");
            abort.abort();
        }
    });

    for job in jobs {
        match pipeline.submit(job).await {
            Ok(job_id) => info!(job_id = %job_id, "Job queued"),
            Err(e) => error!("Job rejected: {}", e),
        }
    }

    let result = pipeline.shutdown().await;
    interrupt.abort();
    let failures = reporter.await.unwrap_or_default();
    result?;

    info!(failures, "Worker shutdown complete");
    if failures > 0 {
        bail!("{} job(s) did not produce a report", failures);
    }
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("crtscan=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Log pipeline events until the pipeline stops. Returns the number of jobs
/// that ended without a persisted report.
async fn report_events(mut events: tokio::sync::mpsc::Receiver<PipelineEvent>) -> usize {
    let mut failures = 0;
    while let Some(event) = events.recv().await {
        let state = event.state().as_str();
        match event {
            PipelineEvent::JobStarted { job_id } => info!(job_id = %job_id, state, "Inspection started"),
            PipelineEvent::Persisted {
                job_id,
                sections,
                location,
            } => info!(job_id = %job_id, state, sections, %location, "Report ready"),
            PipelineEvent::JobFailed { job_id, error } => {
                failures += 1;
                error!(job_id = %job_id, state, "Inspection failed: {}", error);
            }
            PipelineEvent::PersistFailed { job_id, error } => {
                failures += 1;
                error!(job_id = %job_id, state, "Report not written: {}", error);
            }
            PipelineEvent::JobAborted { job_id } => {
                failures += 1;
                warn!(job_id = %job_id, state, "Inspection aborted");
            }
        }
    }
    failures
}
