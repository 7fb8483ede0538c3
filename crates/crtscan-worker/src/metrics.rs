//! Worker metrics.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "crtscan_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "crtscan_jobs_failed_total";
    pub const JOBS_ABORTED_TOTAL: &str = "crtscan_jobs_aborted_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "crtscan_inference_duration_seconds";
    pub const REPORTS_PERSISTED_TOTAL: &str = "crtscan_reports_persisted_total";
    pub const REPORT_FAILURES_TOTAL: &str = "crtscan_report_failures_total";
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

pub fn record_job_completed(video_type: &str, duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL, "video_type" => video_type.to_string()).increment(1);
    histogram!(names::INFERENCE_DURATION_SECONDS, "video_type" => video_type.to_string()).record(duration_secs);
}

pub fn record_job_failed(video_type: &str) {
    counter!(names::JOBS_FAILED_TOTAL, "video_type" => video_type.to_string()).increment(1);
}

pub fn record_job_aborted() {
    counter!(names::JOBS_ABORTED_TOTAL).increment(1);
}

pub fn record_report_persisted(writer: &'static str) {
    counter!(names::REPORTS_PERSISTED_TOTAL, "writer" => writer).increment(1);
}

pub fn record_report_failure(writer: &'static str) {
    counter!(names::REPORT_FAILURES_TOTAL, "writer" => writer).increment(1);
}
