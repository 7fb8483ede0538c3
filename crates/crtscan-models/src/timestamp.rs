//! Timestamp formatting and recording-time parsing utilities.
//!
//! Reports express video positions as `H:MM:SS` (or `H:MM:SS.ss`) and
//! wall-clock times relative to the operator-supplied recording start.

use chrono::{Duration, NaiveDateTime};

/// Formats accepted for the operator-supplied recording start time.
///
/// The first entry is the browser `Date.toString()` prefix
/// (`Mon Jan 02 2023 10:20:30`), the rest are ISO-8601 variants.
const RECORDING_TIME_FORMATS: &[&str] = &[
    "%a %b %d %Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

/// Format seconds into `H:MM:SS` (rounded) or `H:MM:SS.ss`.
///
/// Hours are not zero-padded and are not wrapped at 24.
///
/// # Examples
/// ```
/// use crtscan_models::timestamp::format_hms;
/// assert_eq!(format_hms(3725.0, true), "1:02:05");
/// assert_eq!(format_hms(65.256, false), "0:01:05.26");
/// ```
pub fn format_hms(seconds: f64, round: bool) -> String {
    let seconds = seconds.max(0.0);
    let total_mins = (seconds / 60.0).floor() as u64;
    let hours = total_mins / 60;
    let mins = total_mins % 60;
    let secs = seconds - (total_mins as f64) * 60.0;

    if round {
        // 59.6 rounds to 60 and must carry into the minutes
        let whole = seconds.round() as u64;
        let hours = whole / 3600;
        let mins = (whole % 3600) / 60;
        format!("{}:{:02}:{:02}", hours, mins, whole % 60)
    } else {
        format!("{}:{:02}:{:05.2}", hours, mins, secs)
    }
}

/// Parse a recording start time supplied by the operator.
///
/// Trailing text after the seconds (e.g. `GMT+0800 (China Standard Time)`)
/// is ignored for the browser format.
pub fn parse_recording_time(value: &str) -> Result<NaiveDateTime, RecordingTimeError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RecordingTimeError::Empty);
    }

    for format in RECORDING_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }

    // Browser strings carry a zone suffix after the first five tokens.
    let prefix: Vec<&str> = value.split_whitespace().take(5).collect();
    if prefix.len() == 5 {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&prefix.join(" "), RECORDING_TIME_FORMATS[0]) {
            return Ok(parsed);
        }
    }

    Err(RecordingTimeError::InvalidFormat(value.to_string()))
}

/// Wall-clock time of a video position, given the recording start.
pub fn wall_clock_at(start: NaiveDateTime, offset_ms: f64) -> NaiveDateTime {
    start + Duration::milliseconds(offset_ms.max(0.0).round() as i64)
}

/// Recording time parsing error.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingTimeError {
    /// Value is empty
    Empty,
    /// No supported format matched
    InvalidFormat(String),
}

impl std::fmt::Display for RecordingTimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Recording time cannot be empty"),
            Self::InvalidFormat(value) => write!(
                f,
                "Invalid recording time '{}'. Use 'Mon Jan 02 2023 10:20:30' or ISO-8601",
                value
            ),
        }
    }
}

impl std::error::Error for RecordingTimeError {}
