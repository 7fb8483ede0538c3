//! Inspection worker.
//!
//! This crate provides:
//! - The three-stage job pipeline (inference, persistence, progress relay)
//! - JSON report writing with key-frame images
//! - Progress observers
//! - Graceful drain and hard abort

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod observer;
pub mod pipeline;
pub mod report;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use observer::{LogProgressObserver, ProgressObserver};
pub use pipeline::{JobPipeline, PipelineDeps, PipelineEvent};
pub use report::{JobReport, JsonReportWriter, ReportDocument, ReportReceipt, ReportWriter};
