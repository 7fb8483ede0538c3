//! Inspection job definitions.

use chrono::{DateTime, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::timestamp::parse_recording_time;
use crate::VideoType;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in the submission queue
    #[default]
    Queued,
    /// Being inspected
    Inspecting,
    /// Verdicts handed to the report writer
    Persisted,
    /// Inspection aborted by an oracle failure
    Failed,
    /// Discarded by a hard abort
    Aborted,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Inspecting => "inspecting",
            JobState::Persisted => "persisted",
            JobState::Failed => "failed",
            JobState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Queued | JobState::Inspecting)
    }
}

/// Operator-supplied context copied verbatim into the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperatorMetadata {
    /// Person who ran the inspection
    #[serde(default)]
    pub executor: String,

    /// Workstation the footage was recorded at
    #[serde(default)]
    pub workstation: String,

    /// Wall-clock time the recording started
    #[serde(
        default,
        deserialize_with = "deserialize_recording_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub recording_start_time: Option<NaiveDateTime>,

    /// Free-form note
    #[serde(default)]
    pub memo: String,
}

/// A video queued for inspection.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct InspectionJob {
    /// Unique job ID
    #[serde(default)]
    pub id: JobId,

    /// Path of the video file
    #[validate(custom(function = "validate_non_empty_path"))]
    pub video_source: PathBuf,

    /// Directory under which the report directory is created
    #[validate(custom(function = "validate_non_empty_path"))]
    pub destination_dir: PathBuf,

    #[serde(default)]
    pub operator: OperatorMetadata,

    /// Selects oracle set and thresholds
    #[serde(default)]
    pub video_type: VideoType,

    /// Dump per-frame classifier signals next to the report
    #[serde(default)]
    pub auxiliary_debug_output: bool,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl InspectionJob {
    /// Create a new screen inspection job.
    pub fn new(video_source: impl Into<PathBuf>, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            video_source: video_source.into(),
            destination_dir: destination_dir.into(),
            operator: OperatorMetadata::default(),
            video_type: VideoType::default(),
            auxiliary_debug_output: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_operator(mut self, operator: OperatorMetadata) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_video_type(mut self, video_type: VideoType) -> Self {
        self.video_type = video_type;
        self
    }

    pub fn with_debug_output(mut self, enabled: bool) -> Self {
        self.auxiliary_debug_output = enabled;
        self
    }

    /// File stem of the video, used to name the report directory.
    pub fn video_stem(&self) -> String {
        self.video_source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Directory the report for this job is written to.
    pub fn report_dir(&self) -> PathBuf {
        self.destination_dir.join(self.video_stem())
    }
}

/// Accepts the browser `Date.toString()` form as well as ISO-8601.
fn deserialize_recording_time<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_recording_time(s).map(Some).map_err(serde::de::Error::custom),
    }
}

fn validate_non_empty_path(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::new("empty_path"));
    }
    Ok(())
}
