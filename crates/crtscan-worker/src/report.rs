//! Report writers.
//!
//! A report writer receives one finished job (its operator metadata and
//! ordered verdicts) and acknowledges receipt. `JsonReportWriter` lays a
//! report out on disk as:
//!
//! ```text
//! <destination>/<video stem>/summary.json
//! <destination>/<video stem>/images/001.jpg
//! <destination>/<video stem>/debug/section_01.json   (auxiliary debug output)
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crtscan_media::{FrameImage, SectionSignals, SectionVerdict};
use crtscan_models::timestamp::wall_clock_at;
use crtscan_models::{format_hms, ClassificationVerdict, InspectionJob, JobId, SectionCategory, VideoType};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

const JPEG_QUALITY: u8 = 90;

/// Result record of one inspected job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: InspectionJob,
    /// Verdicts in section order
    pub verdicts: Vec<SectionVerdict>,
    pub completed_at: DateTime<Utc>,
}

impl JobReport {
    pub fn new(job: InspectionJob, verdicts: Vec<SectionVerdict>) -> Self {
        Self {
            job,
            verdicts,
            completed_at: Utc::now(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job.id
    }
}

/// Acknowledgement of a persisted report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportReceipt {
    /// Where the writer put the report
    pub location: String,
}

/// Destination of finished job reports.
#[async_trait]
pub trait ReportWriter: Send + Sync {
    async fn write(&self, report: &JobReport) -> WorkerResult<ReportReceipt>;

    fn name(&self) -> &'static str;
}

/// Section counts per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportSummary {
    pub total: usize,
    pub pass: usize,
    pub broken: usize,
    pub phosphor_residue: usize,
    pub cone_residue: usize,
    pub fog: usize,
}

impl ReportSummary {
    pub fn from_verdicts<'a>(verdicts: impl IntoIterator<Item = &'a ClassificationVerdict>) -> Self {
        verdicts.into_iter().fold(Self::default(), |mut summary, verdict| {
            summary.total += 1;
            match verdict.category {
                SectionCategory::Pass => summary.pass += 1,
                SectionCategory::Broken => summary.broken += 1,
                SectionCategory::PhosphorResidue => summary.phosphor_residue += 1,
                SectionCategory::ConeResidue => summary.cone_residue += 1,
                SectionCategory::FogDetected => summary.fog += 1,
            }
            summary
        })
    }
}

/// One row of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportSection {
    /// 1-based
    pub section_index: usize,
    pub relative_start_time: String,
    pub relative_end_time: String,
    /// Wall-clock times, present when the recording start is known
    pub absolute_start_time: Option<String>,
    pub absolute_end_time: Option<String>,
    /// Seconds
    pub duration: f64,
    pub examination_result: String,
    pub residual_glass_percentage: f64,
    /// Relative to the report directory
    pub key_frame_path: Option<String>,
    pub key_frame_time: String,
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportDocument {
    pub examiner: String,
    pub video_path: String,
    pub work_station: String,
    pub video_type: VideoType,
    pub video_start_date_time: Option<String>,
    pub note: String,
    pub time_stamp: String,
    pub summary: ReportSummary,
    // Field name kept for existing report consumers.
    #[serde(rename = "Proceduces")]
    pub procedures: Vec<ReportSection>,
}

impl ReportDocument {
    /// Build the document. `key_frame_paths[i]` is the stored key frame of
    /// verdict `i`, if any.
    pub fn build(report: &JobReport, key_frame_paths: &[Option<String>]) -> Self {
        let operator = &report.job.operator;
        let start = operator.recording_start_time;
        let clock = |ms: f64| start.map(|s| wall_clock_at(s, ms).format("%H:%M:%S").to_string());

        let procedures = report
            .verdicts
            .iter()
            .enumerate()
            .map(|(i, section)| {
                let verdict = &section.verdict;
                ReportSection {
                    section_index: i + 1,
                    relative_start_time: format_hms(verdict.section_start_ms / 1000.0, false),
                    relative_end_time: format_hms(verdict.section_end_ms / 1000.0, false),
                    absolute_start_time: clock(verdict.section_start_ms),
                    absolute_end_time: clock(verdict.section_end_ms),
                    duration: verdict.duration_ms() / 1000.0,
                    examination_result: verdict.category.label().to_string(),
                    residual_glass_percentage: verdict.metric,
                    key_frame_path: key_frame_paths.get(i).cloned().flatten(),
                    key_frame_time: format_hms(verdict.key_timestamp_ms / 1000.0, false),
                }
            })
            .collect();

        Self {
            examiner: operator.executor.clone(),
            video_path: report.job.video_source.display().to_string(),
            work_station: operator.workstation.clone(),
            video_type: report.job.video_type,
            video_start_date_time: start.map(|s| s.format("%Y/%m/%d %H:%M:%S").to_string()),
            note: operator.memo.clone(),
            time_stamp: report.completed_at.format("%Y/%m/%d %H:%M:%S").to_string(),
            summary: ReportSummary::from_verdicts(report.verdicts.iter().map(|v| &v.verdict)),
            procedures,
        }
    }
}

#[derive(Serialize)]
struct SectionDebug<'a> {
    verdict: &'a ClassificationVerdict,
    signals: &'a SectionSignals,
}

/// Writes reports as JSON plus JPEG key frames.
#[derive(Debug, Clone, Default)]
pub struct JsonReportWriter;

impl JsonReportWriter {
    pub fn new() -> Self {
        Self
    }

    async fn write_key_frame(dir: &Path, section: usize, frame: &FrameImage) -> WorkerResult<String> {
        let file_name = format!("{:03}.jpg", section);
        let mut jpeg = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode(frame.as_raw(), frame.width(), frame.height(), ColorType::Rgb8)
            .map_err(|e| WorkerError::report_failed(format!("key frame {}: {}", file_name, e)))?;
        tokio::fs::write(dir.join(&file_name), jpeg.into_inner()).await?;
        Ok(format!("./images/{}", file_name))
    }
}

#[async_trait]
impl ReportWriter for JsonReportWriter {
    async fn write(&self, report: &JobReport) -> WorkerResult<ReportReceipt> {
        let report_dir: PathBuf = report.job.report_dir();
        tokio::fs::create_dir_all(&report_dir).await?;

        let mut key_frame_paths = Vec::with_capacity(report.verdicts.len());
        let images_dir = report_dir.join("images");
        for (i, section) in report.verdicts.iter().enumerate() {
            let path = match &section.key_frame {
                Some(frame) => {
                    tokio::fs::create_dir_all(&images_dir).await?;
                    Some(Self::write_key_frame(&images_dir, i + 1, frame).await?)
                }
                None => None,
            };
            key_frame_paths.push(path);
        }

        if report.job.auxiliary_debug_output && !report.verdicts.is_empty() {
            let debug_dir = report_dir.join("debug");
            tokio::fs::create_dir_all(&debug_dir).await?;
            for (i, section) in report.verdicts.iter().enumerate() {
                let dump = SectionDebug {
                    verdict: &section.verdict,
                    signals: &section.signals,
                };
                let path = debug_dir.join(format!("section_{:02}.json", i + 1));
                tokio::fs::write(path, serde_json::to_vec_pretty(&dump)?).await?;
            }
        }

        let document = ReportDocument::build(report, &key_frame_paths);
        let summary_path = report_dir.join("summary.json");
        tokio::fs::write(&summary_path, serde_json::to_vec_pretty(&document)?).await?;

        debug!(
            job_id = %report.job_id(),
            path = %summary_path.display(),
            sections = document.summary.total,
            "Report written"
        );

        Ok(ReportReceipt {
            location: report_dir.display().to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
